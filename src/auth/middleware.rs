use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use uuid::Uuid;

use crate::auth::token::TokenKind;
use crate::error::AppError;
use crate::state::AppState;

/// Endpoints under `/api/v1` that are reachable without a token.
const PUBLIC_PATHS: &[&str] = &[
    "/api/v1/auth/register",
    "/api/v1/auth/login",
    "/api/v1/auth/refresh",
    "/api/v1/auth/password-reset/request",
    "/api/v1/auth/password-reset/confirm",
    "/api/v1/auth/verify-email",
    "/api/v1/auth/resend-verification",
];

/// Returns the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &actix_web::HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves an access token into the user id it was issued for.
pub fn authenticate_token(state: &AppState, token: &str) -> Result<Uuid, AppError> {
    let subject = state.tokens.verify(token, TokenKind::Access)?;
    Uuid::parse_str(&subject)
        .map_err(|_| AppError::InvalidToken("Could not validate credentials".into()))
}

/// Requires a valid access token on every non-public request and stores the
/// token's user id in the request extensions. Rejected requests are answered
/// here with the error's own response.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if PUBLIC_PATHS.contains(&req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) });
        }

        let user_id = match req.app_data::<web::Data<AppState>>() {
            Some(state) => match bearer_token(req.request()) {
                Some(token) => authenticate_token(state, token),
                None => Err(AppError::AuthenticationError("Not authenticated".into())),
            },
            None => Err(AppError::InternalServerError(
                "Application state is not configured".into(),
            )),
        };

        match user_id {
            Ok(user_id) => {
                req.extensions_mut().insert(user_id);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) })
            }
            Err(app_err) => {
                log::debug!("Rejected request to {}: {}", req.path(), app_err);
                let res = req.into_response(app_err.error_response());
                Box::pin(ready(Ok(res.map_into_right_body())))
            }
        }
    }
}
