//! Registration, login and the token lifecycle.
//!
//! Access and refresh tokens carry the user's id as subject. Reset and verification
//! tokens carry the email address, so a reset token can be issued for any address
//! without revealing whether it is registered.

use std::sync::Arc;

use actix_web::web;
use uuid::Uuid;

use crate::auth::{
    PasswordHasher, RegisterRequest, RegisterResponse, RefreshTokenResponse, TokenCodec,
    TokenKind, TokenResponse,
};
use crate::error::AppError;
use crate::models::{NewUser, User, UserChanges};
use crate::store::UserStore;

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenCodec,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenCodec, hasher: PasswordHasher) -> Self {
        Self {
            users,
            tokens,
            hasher,
        }
    }

    /// Hashes on the blocking pool so bcrypt never stalls a worker.
    pub(crate) async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher;
        web::block(move || hasher.hash(&password)).await?
    }

    pub(crate) async fn verify_password(
        &self,
        password: String,
        hashed_password: String,
    ) -> Result<bool, AppError> {
        let hasher = self.hasher;
        Ok(web::block(move || hasher.verify(&password, &hashed_password)).await?)
    }

    /// Creates an active, unverified account and returns it with a verification token.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AppError> {
        if self.users.email_exists(&request.email).await? {
            return Err(AppError::AlreadyExists("Email already registered".into()));
        }
        if self.users.username_exists(&request.username).await? {
            return Err(AppError::AlreadyExists("Username already taken".into()));
        }

        let hashed_password = self.hash_password(request.password).await?;
        // A concurrent registration that slips past the checks above still hits the
        // unique constraints and surfaces as AlreadyExists.
        let user = self
            .users
            .create(NewUser {
                email: request.email,
                username: request.username,
                hashed_password,
                full_name: request.full_name,
            })
            .await?;

        let verification_token = self.tokens.issue(&user.email, TokenKind::Verification)?;
        log::info!("Registered user {}", user.id);

        Ok(RegisterResponse {
            message: "User registered successfully. Please verify your email.".into(),
            user,
            verification_token,
        })
    }

    /// Checks credentials. `identifier` may be an email address or a username.
    /// Verification state does not matter here.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, AppError> {
        let bad_credentials = || AppError::AuthenticationError("Incorrect username or password".into());

        let user = self
            .users
            .get_by_email_or_username(identifier)
            .await?
            .ok_or_else(bad_credentials)?;

        let matches = self
            .verify_password(password.to_string(), user.hashed_password.clone())
            .await?;
        if !matches {
            return Err(bad_credentials());
        }
        if !user.is_active {
            return Err(AppError::inactive_user());
        }

        Ok(user)
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenResponse, AppError> {
        let user = self.authenticate(identifier, password).await?;
        let subject = user.id.to_string();

        let access_token = self.tokens.issue(&subject, TokenKind::Access)?;
        let refresh_token = self.tokens.issue(&subject, TokenKind::Refresh)?;
        log::debug!("Issued tokens for user {}", user.id);

        Ok(TokenResponse::bearer(access_token, refresh_token))
    }

    /// Exchanges a refresh token for a new access token. The refresh token itself is
    /// not rotated.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenResponse, AppError> {
        let subject = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        let user_id =
            Uuid::parse_str(&subject).map_err(|_| AppError::NotFound("User not found".into()))?;

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        if !user.is_active {
            return Err(AppError::inactive_user());
        }

        let access_token = self.tokens.issue(&user.id.to_string(), TokenKind::Access)?;
        Ok(RefreshTokenResponse::bearer(access_token))
    }

    /// Always returns a reset token bound to `email`, registered or not. A token for an
    /// unknown address fails later with `NotFound`.
    pub fn request_password_reset(&self, email: &str) -> Result<String, AppError> {
        self.tokens.issue(email, TokenKind::Reset)
    }

    pub async fn reset_password(&self, token: &str, new_password: String) -> Result<(), AppError> {
        let email = self.tokens.verify(token, TokenKind::Reset).map_err(|e| {
            log::debug!("Rejected reset token: {}", e);
            AppError::InvalidToken("Invalid or expired reset token".into())
        })?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let hashed_password = self.hash_password(new_password).await?;
        self.users
            .update(
                user.id,
                UserChanges {
                    hashed_password: Some(hashed_password),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        log::info!("Password reset for user {}", user.id);
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AppError> {
        let email = self
            .tokens
            .verify(token, TokenKind::Verification)
            .map_err(|e| {
                log::debug!("Rejected verification token: {}", e);
                AppError::InvalidToken("Invalid or expired verification token".into())
            })?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        self.users
            .update(
                user.id,
                UserChanges {
                    is_verified: Some(true),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    /// Issues a fresh verification token. Earlier tokens stay valid until they expire.
    pub async fn resend_verification(&self, email: &str) -> Result<String, AppError> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        self.tokens.issue(&user.email, TokenKind::Verification)
    }
}
