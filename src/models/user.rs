use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::double_option;

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    pub static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// A registered account.
///
/// The password hash is never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub hashed_password: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when an account is created. New accounts start active and unverified.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
}

/// A partial update of a user record; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<Option<String>>,
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.full_name.is_none()
            && self.hashed_password.is_none()
            && self.is_active.is_none()
            && self.is_verified.is_none()
    }

    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(hashed_password) = &self.hashed_password {
            user.hashed_password = hashed_password.clone();
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(is_verified) = self.is_verified {
            user.is_verified = is_verified;
        }
    }
}

/// Profile update payload for `PUT /users/me`. All fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(
        length(min = 3, max = 50),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub full_name: Option<Option<String>>,
}

/// Payload for `PUT /users/me/password`.
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordUpdate {
    pub current_password: String,
    #[validate(length(min = 8, max = 100))]
    pub new_password: String,
}
