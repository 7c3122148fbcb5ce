use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;

use crate::auth::OptionalUser;
use crate::state::AppState;

/// Health check endpoint
///
/// Pings the database and reports `healthy`, or `degraded` when the ping fails.
/// Always answers `200 OK` so load balancers can read the body.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let (status, database) = match state.stores.health.ping().await {
        Ok(()) => ("healthy", "healthy"),
        Err(err) => {
            log::error!("Database health check failed: {}", err);
            ("degraded", "unhealthy")
        }
    };

    HttpResponse::Ok().json(json!({
        "status": status,
        "app_name": state.app_name,
        "version": state.app_version,
        "environment": state.environment,
        "database": database
    }))
}

/// Request counts and the ten slowest endpoints since startup or the last reset.
#[get("/metrics")]
pub async fn metrics(state: web::Data<AppState>) -> impl Responder {
    let snapshot = state.monitor.snapshot();
    HttpResponse::Ok().json(json!({
        "uptime": format!("{:.2} seconds", snapshot.uptime_seconds),
        "total_requests": snapshot.total_requests,
        "total_errors": snapshot.total_errors,
        "slowest_endpoints": snapshot.endpoints
    }))
}

#[post("/metrics/reset")]
pub async fn reset_metrics(state: web::Data<AppState>) -> impl Responder {
    state.monitor.reset();
    log::info!("Performance metrics reset");
    HttpResponse::Ok().json(json!({ "message": "Metrics reset successfully" }))
}

/// API information. Greets the caller by username when a valid access token is sent.
#[get("/")]
pub async fn root(state: web::Data<AppState>, user: OptionalUser) -> impl Responder {
    let mut body = json!({
        "message": format!("Welcome to {}", state.app_name),
        "version": state.app_version,
        "health": "/health"
    });
    if let OptionalUser(Some(user)) = user {
        body["user"] = json!(user.username);
    }
    HttpResponse::Ok().json(body)
}
