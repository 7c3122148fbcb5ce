use crate::{
    auth::{ActiveUser, VerifiedUser},
    error::AppError,
    models::{PasswordUpdate, UserUpdate},
    state::AppState,
};
use actix_web::{delete, get, put, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

#[get("/me")]
pub async fn get_profile(user: ActiveUser) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(user.0))
}

/// Update the caller's profile
///
/// Only the fields present in the body change. A new email address has to be
/// verified again.
///
/// ## Responses:
/// - `200 OK`: The updated user.
/// - `409 Conflict`: The email or username belongs to another account.
/// - `422 Unprocessable Entity`: Input validation failed.
#[put("/me")]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: ActiveUser,
    update: web::Json<UserUpdate>,
) -> Result<impl Responder, AppError> {
    update.validate()?;

    let updated = state
        .users
        .update_profile(&user, update.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[put("/me/password")]
pub async fn update_password(
    state: web::Data<AppState>,
    user: ActiveUser,
    update: web::Json<PasswordUpdate>,
) -> Result<impl Responder, AppError> {
    update.validate()?;

    state
        .users
        .change_password(&user, update.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated successfully" })))
}

/// Delete the caller's account, including all of their categories and tasks.
#[delete("/me")]
pub async fn delete_account(
    state: web::Data<AppState>,
    user: ActiveUser,
) -> Result<impl Responder, AppError> {
    state.users.delete_account(&user).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Account deleted successfully" })))
}

/// Look up another user's profile. Only verified users may do this.
#[get("/{id}")]
pub async fn get_user(
    state: web::Data<AppState>,
    _caller: VerifiedUser,
    user_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let user = state.users.public_profile(user_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}
