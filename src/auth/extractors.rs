//! Request extractors that turn the identity left by [`AuthMiddleware`] into a
//! loaded [`User`], with increasingly strict account checks.
//!
//! [`AuthMiddleware`]: crate::auth::middleware::AuthMiddleware

use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use crate::auth::middleware::{authenticate_token, bearer_token};
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalServerError("Application state is not configured".into()))
}

async fn load_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .stores
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::AuthenticationError("Could not validate credentials".into()))
}

pub fn require_active(user: User) -> Result<User, AppError> {
    if !user.is_active {
        return Err(AppError::inactive_user());
    }
    Ok(user)
}

pub fn require_verified(user: User) -> Result<User, AppError> {
    let user = require_active(user)?;
    if !user.is_verified {
        return Err(AppError::unverified_user());
    }
    Ok(user)
}

/// The user whose access token authorized this request.
///
/// Fails with 401 if `AuthMiddleware` did not run or the user no longer exists.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req.extensions().get::<Uuid>().copied();
        let state = app_state(req);

        Box::pin(async move {
            let user_id = user_id.ok_or_else(|| {
                AppError::AuthenticationError("Not authenticated".into())
            })?;
            let state = state?;
            let user = load_user(&state, user_id).await?;
            Ok(AuthenticatedUser(user))
        })
    }
}

/// An authenticated user whose account is active (403 otherwise).
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

impl FromRequest for ActiveUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let authenticated = AuthenticatedUser::from_request(req, payload);
        Box::pin(async move {
            let AuthenticatedUser(user) = authenticated.await?;
            Ok(ActiveUser(require_active(user)?))
        })
    }
}

/// An active user who has verified their email address (403 otherwise).
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub User);

impl FromRequest for VerifiedUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let authenticated = AuthenticatedUser::from_request(req, payload);
        Box::pin(async move {
            let AuthenticatedUser(user) = authenticated.await?;
            Ok(VerifiedUser(require_verified(user)?))
        })
    }
}

/// The caller, if the request carries a usable access token. Never fails, and
/// does not need `AuthMiddleware`.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl FromRequest for OptionalUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = app_state(req).ok();
        let user_id = state
            .as_ref()
            .zip(bearer_token(req))
            .and_then(|(state, token)| authenticate_token(state, token).ok());

        Box::pin(async move {
            let user = match (state, user_id) {
                (Some(state), Some(user_id)) => load_user(&state, user_id).await.ok(),
                _ => None,
            };
            Ok(OptionalUser(user.filter(|u| u.is_active)))
        })
    }
}

macro_rules! deref_user {
    ($($extractor:ident),*) => {
        $(impl Deref for $extractor {
            type Target = User;

            fn deref(&self) -> &User {
                &self.0
            }
        })*
    };
}

deref_user!(AuthenticatedUser, ActiveUser, VerifiedUser);
