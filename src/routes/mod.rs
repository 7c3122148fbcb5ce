pub mod auth;
pub mod categories;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::{error, web, HttpRequest};

use crate::auth::AuthMiddleware;
use crate::error::AppError;

fn bad_request(err: impl std::fmt::Display, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

/// Registers every route. Malformed bodies, query strings and path segments are
/// answered with `400 Bad Request` in the usual `{"detail"}` shape.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err: error::JsonPayloadError, req| {
        bad_request(err, req)
    }))
    .app_data(web::QueryConfig::default().error_handler(|err: error::QueryPayloadError, req| {
        bad_request(err, req)
    }))
    .app_data(web::PathConfig::default().error_handler(|err: error::PathError, req| {
        bad_request(err, req)
    }))
    .service(health::health)
    .service(health::metrics)
    .service(health::reset_metrics)
    .service(health::root)
    .service(
        web::scope("/api/v1")
            .wrap(AuthMiddleware)
            .service(
                web::scope("/auth")
                    .service(auth::register)
                    .service(auth::login)
                    .service(auth::refresh)
                    .service(auth::request_password_reset)
                    .service(auth::confirm_password_reset)
                    .service(auth::verify_email)
                    .service(auth::resend_verification)
                    .service(auth::me)
                    .service(auth::logout),
            )
            .service(
                web::scope("/users")
                    .service(users::get_profile)
                    .service(users::update_profile)
                    .service(users::update_password)
                    .service(users::delete_account)
                    .service(users::get_user),
            )
            .service(
                web::scope("/categories")
                    .service(categories::list_categories)
                    .service(categories::create_category)
                    .service(categories::category_stats)
                    .service(categories::get_category)
                    .service(categories::update_category)
                    .service(categories::delete_category),
            )
            .service(
                web::scope("/tasks")
                    // Fixed segments first so they are not parsed as task ids.
                    .service(tasks::get_overdue_tasks)
                    .service(tasks::get_task_statistics)
                    .service(tasks::get_tasks)
                    .service(tasks::create_task)
                    .service(tasks::get_task)
                    .service(tasks::update_task)
                    .service(tasks::delete_task)
                    .service(tasks::update_task_status)
                    .service(tasks::update_task_priority),
            ),
    );
}
