use crate::error::AppError;

/// bcrypt hashing with a configurable work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
    }

    /// Checks `password` against a stored digest. A malformed digest never matches.
    pub fn verify(&self, password: &str, hashed_password: &str) -> bool {
        bcrypt::verify(password, hashed_password).unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}
