pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::user::{User, USERNAME_REGEX};

// Re-export necessary items
pub use extractors::{ActiveUser, AuthenticatedUser, OptionalUser, VerifiedUser};
pub use middleware::AuthMiddleware;
pub use password::PasswordHasher;
pub use token::{Claims, TokenCodec, TokenKind};

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email address.
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address for the new account. Must be unique.
    #[validate(email, length(max = 255))]
    pub email: String,
    /// Desired username for the new account.
    /// Must be between 3 and 50 characters, alphanumeric, and can include underscores or hyphens.
    #[validate(
        length(min = 3, max = 50),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    /// Password for the new account.
    /// Must be between 8 and 100 characters long.
    #[validate(length(min = 8, max = 100))]
    pub password: String,
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirm {
    pub token: String,
    #[validate(length(min = 8, max = 100))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailVerificationRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email)]
    pub email: String,
}

/// Access and refresh token pair returned on login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl RefreshTokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// A newly registered account and the token that verifies its email address.
///
/// No mail is sent, so the verification token is returned to the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: User,
    pub verification_token: String,
}
