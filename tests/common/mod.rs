//! Shared setup for the HTTP integration suites.
//!
//! Every suite runs against the in-memory store, so no database is needed.
#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App, Error};
use serde_json::{json, Value};

use taskhub::config::Config;
use taskhub::monitoring::RequestMetrics;
use taskhub::rate_limit::{RateLimit, RateLimits};
use taskhub::routes;
use taskhub::state::AppState;
use taskhub::store::Stores;

pub const PASSWORD: &str = "Password123!";

/// Cheap hashing and quotas high enough that suites never hit them.
pub fn test_config() -> Config {
    let mut config = Config::new("memory://", "integration-test-secret");
    config.bcrypt_cost = 4;
    config.rate_limit_per_minute = 10_000;
    config.auth_rate_limit_per_minute = 10_000;
    config
}

pub fn test_state() -> web::Data<AppState> {
    web::Data::new(AppState::new(&test_config(), Stores::memory()))
}

/// Builds the application with the same middleware stack as the binary, minus CORS.
pub async fn init_app(
    state: web::Data<AppState>,
    limits: RateLimits,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
    let monitor = state.monitor.clone();
    test::init_service(
        App::new()
            .app_data(state)
            .wrap(RequestMetrics::new(monitor))
            .wrap(RateLimit::new(limits))
            .configure(routes::config),
    )
    .await
}

pub async fn default_app(
    state: web::Data<AppState>,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
    let config = test_config();
    let limits = RateLimits::new(config.rate_limit_per_minute, config.auth_rate_limit_per_minute);
    init_app(state, limits).await
}

pub fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
    (
        actix_web::http::header::AUTHORIZATION,
        format!("Bearer {}", token),
    )
}

/// Registers `username` with `<username>@example.com` and returns the register response.
pub async fn register<S, B>(app: &S, username: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({
            "email": format!("{}@example.com", username),
            "username": username,
            "password": PASSWORD,
            "full_name": "Integration User"
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), 201, "registration of {} failed", username);
    test::read_body_json(resp).await
}

/// Logs in and returns the full token response.
pub async fn login<S, B>(app: &S, identifier: &str, password: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": identifier, "password": password }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), 200, "login as {} failed", identifier);
    test::read_body_json(resp).await
}

/// Registers a fresh user and returns an access token for them.
pub async fn register_and_login<S, B>(app: &S, username: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    register(app, username).await;
    let tokens = login(app, username, PASSWORD).await;
    tokens["access_token"]
        .as_str()
        .expect("access_token in login response")
        .to_string()
}

/// Registers, verifies the email address, and logs in.
pub async fn verified_user<S, B>(app: &S, username: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let registered = register(app, username).await;
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/verify-email")
        .set_json(json!({ "token": registered["verification_token"] }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), 200);

    let tokens = login(app, username, PASSWORD).await;
    tokens["access_token"].as_str().unwrap().to_string()
}

pub async fn create_category<S, B>(app: &S, token: &str, name: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/categories")
        .insert_header(bearer(token))
        .set_json(json!({ "name": name }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), 201);
    test::read_body_json(resp).await
}

pub async fn create_task<S, B>(app: &S, token: &str, body: Value) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/tasks")
        .insert_header(bearer(token))
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), 201);
    test::read_body_json(resp).await
}
