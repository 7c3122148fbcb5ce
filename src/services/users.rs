use std::sync::Arc;

use uuid::Uuid;

use super::AuthService;
use crate::error::AppError;
use crate::models::{PasswordUpdate, User, UserChanges, UserUpdate};
use crate::store::UserStore;

/// Self-service profile management for the signed-in user.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    auth: AuthService,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, auth: AuthService) -> Self {
        Self { users, auth }
    }

    /// Applies a profile update. Changing the email address marks the account
    /// unverified again.
    pub async fn update_profile(&self, user: &User, update: UserUpdate) -> Result<User, AppError> {
        let mut changes = UserChanges::default();

        if let Some(email) = update.email.filter(|email| *email != user.email) {
            if self.users.email_exists(&email).await? {
                return Err(AppError::AlreadyExists("Email already registered".into()));
            }
            changes.email = Some(email);
            changes.is_verified = Some(false);
        }
        if let Some(username) = update.username.filter(|name| *name != user.username) {
            if self.users.username_exists(&username).await? {
                return Err(AppError::AlreadyExists("Username already taken".into()));
            }
            changes.username = Some(username);
        }
        changes.full_name = update.full_name;

        if changes.is_empty() {
            return Ok(user.clone());
        }

        self.users
            .update(user.id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn change_password(&self, user: &User, update: PasswordUpdate) -> Result<(), AppError> {
        let matches = self
            .auth
            .verify_password(update.current_password, user.hashed_password.clone())
            .await?;
        if !matches {
            return Err(AppError::BadRequest("Incorrect current password".into()));
        }

        let hashed_password = self.auth.hash_password(update.new_password).await?;
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
        Ok(())
    }

    /// Deletes the account together with everything it owns.
    pub async fn delete_account(&self, user: &User) -> Result<(), AppError> {
        if !self.users.delete(user.id).await? {
            return Err(AppError::NotFound("User not found".into()));
        }
        log::info!("Deleted user {}", user.id);
        Ok(())
    }

    pub async fn public_profile(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordHasher, RegisterRequest, TokenCodec};
    use crate::config::TokenSettings;
    use crate::store::Stores;

    async fn setup() -> (UserService, AuthService, User) {
        let stores = Stores::memory();
        let auth = AuthService::new(
            stores.users.clone(),
            TokenCodec::new(&TokenSettings::with_secret("user-service-secret")),
            PasswordHasher::new(4),
        );
        let service = UserService::new(stores.users.clone(), auth.clone());

        for name in ["alice", "bob"] {
            auth.register(RegisterRequest {
                email: format!("{}@example.com", name),
                username: name.to_string(),
                password: "password123".to_string(),
                full_name: None,
            })
            .await
            .unwrap();
        }
        let alice = auth.authenticate("alice", "password123").await.unwrap();
        (service, auth, alice)
    }

    #[actix_rt::test]
    async fn test_email_change_resets_verification() {
        let (service, auth, alice) = setup().await;
        let token = auth.resend_verification("alice@example.com").await.unwrap();
        let alice = auth.verify_email(&token).await.unwrap();
        assert!(alice.is_verified);

        let updated = service
            .update_profile(
                &alice,
                UserUpdate {
                    email: Some("alice@new.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "alice@new.example.com");
        assert!(!updated.is_verified);
    }

    #[actix_rt::test]
    async fn test_profile_collisions() {
        let (service, _, alice) = setup().await;

        let err = service
            .update_profile(
                &alice,
                UserUpdate {
                    username: Some("bob".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        // Re-submitting the current values is not a collision
        let unchanged = service
            .update_profile(
                &alice,
                UserUpdate {
                    email: Some(alice.email.clone()),
                    username: Some(alice.username.clone()),
                    full_name: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(unchanged.updated_at, alice.updated_at);
    }

    #[actix_rt::test]
    async fn test_change_password() {
        let (service, auth, alice) = setup().await;

        let err = service
            .change_password(
                &alice,
                PasswordUpdate {
                    current_password: "not-my-password".to_string(),
                    new_password: "new-password-1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Incorrect current password"));

        service
            .change_password(
                &alice,
                PasswordUpdate {
                    current_password: "password123".to_string(),
                    new_password: "new-password-1".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(auth.authenticate("alice", "new-password-1").await.is_ok());
    }

    #[actix_rt::test]
    async fn test_delete_account() {
        let (service, _, alice) = setup().await;
        service.delete_account(&alice).await.unwrap();
        assert!(matches!(
            service.public_profile(alice.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
