#![doc = "The `taskhub` library crate."]
#![doc = ""]
#![doc = "This crate contains the domain models, persistence stores, authentication and token"]
#![doc = "lifecycle, ownership-scoped services, middleware, routing configuration and error"]
#![doc = "handling for the task management API. It is used by the main binary (`main.rs`)"]
#![doc = "and by the integration tests to construct and run the application."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod monitoring;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
