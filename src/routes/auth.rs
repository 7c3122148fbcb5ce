use crate::{
    auth::{
        ActiveUser, EmailVerificationRequest, LoginRequest, PasswordResetConfirm,
        PasswordResetRequest, RefreshTokenRequest, RegisterRequest, ResendVerificationRequest,
    },
    error::AppError,
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

/// Register a new user
///
/// Creates an active, unverified account. No mail is sent, so outside production
/// the response carries the email verification token.
///
/// ## Responses:
/// - `201 Created`: `{message, user}`, plus `verification_token` outside production.
/// - `409 Conflict`: The email or username is already taken.
/// - `422 Unprocessable Entity`: Input validation failed.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let registered = state.auth.register(register_data.into_inner()).await?;
    let mut body = json!({
        "message": registered.message,
        "user": registered.user
    });
    if !state.is_production() {
        body["verification_token"] = json!(registered.verification_token);
    }
    Ok(HttpResponse::Created().json(body))
}

/// Login user
///
/// Authenticates with a username or email address and returns an access and refresh
/// token pair.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let tokens = state
        .auth
        .login(&login_data.username, &login_data.password)
        .await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Exchange a refresh token for a new access token.
#[post("/refresh")]
pub async fn refresh(
    state: web::Data<AppState>,
    refresh_data: web::Json<RefreshTokenRequest>,
) -> Result<impl Responder, AppError> {
    let response = state
        .auth
        .refresh_access_token(&refresh_data.refresh_token)
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Request a password reset token.
///
/// Answers the same way whether or not the address is registered. Outside
/// production the token is included in the body for development use.
#[post("/password-reset/request")]
pub async fn request_password_reset(
    state: web::Data<AppState>,
    reset_request: web::Json<PasswordResetRequest>,
) -> Result<impl Responder, AppError> {
    reset_request.validate()?;

    let reset_token = state.auth.request_password_reset(&reset_request.email)?;
    let mut body = json!({
        "message": "If the email exists, a password reset link has been sent."
    });
    if !state.is_production() {
        body["reset_token"] = json!(reset_token);
    }
    Ok(HttpResponse::Ok().json(body))
}

#[post("/password-reset/confirm")]
pub async fn confirm_password_reset(
    state: web::Data<AppState>,
    reset_data: web::Json<PasswordResetConfirm>,
) -> Result<impl Responder, AppError> {
    reset_data.validate()?;

    let PasswordResetConfirm {
        token,
        new_password,
    } = reset_data.into_inner();
    state.auth.reset_password(&token, new_password).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password reset successfully" })))
}

#[post("/verify-email")]
pub async fn verify_email(
    state: web::Data<AppState>,
    verification_data: web::Json<EmailVerificationRequest>,
) -> Result<impl Responder, AppError> {
    state.auth.verify_email(&verification_data.token).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Email verified successfully" })))
}

#[post("/resend-verification")]
pub async fn resend_verification(
    state: web::Data<AppState>,
    resend_request: web::Json<ResendVerificationRequest>,
) -> Result<impl Responder, AppError> {
    resend_request.validate()?;

    let verification_token = state
        .auth
        .resend_verification(&resend_request.email)
        .await?;
    let mut body = json!({ "message": "Verification email sent" });
    if !state.is_production() {
        body["verification_token"] = json!(verification_token);
    }
    Ok(HttpResponse::Ok().json(body))
}

/// The authenticated user's own record.
#[get("/me")]
pub async fn me(user: ActiveUser) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(user.0))
}

/// Tokens are stateless, so logging out only requires the client to discard them.
#[post("/logout")]
pub async fn logout(_user: ActiveUser) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(json!({ "message": "Logged out successfully" })))
}
