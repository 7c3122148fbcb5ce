use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use taskhub::config::Config;
use taskhub::monitoring::RequestMetrics;
use taskhub::rate_limit::{RateLimit, RateLimits};
use taskhub::routes;
use taskhub::state::AppState;
use taskhub::store::{PgStore, Stores};

const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

async fn build_stores(config: &Config) -> std::io::Result<Stores> {
    if config.uses_memory_store() {
        log::warn!("Using the in-memory store; data is lost on shutdown");
        return Ok(Stores::memory());
    }

    let store = PgStore::connect(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| {
            log::error!("Failed to connect to database: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e)
        })?;
    store.migrate().await.map_err(|e| {
        log::error!("Failed to run database migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;
    log::info!("Database ready");

    Ok(Stores::from_backend(Arc::new(store)))
}

fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let stores = build_stores(&config).await?;
    let state = web::Data::new(AppState::new(&config, stores));
    let monitor = state.monitor.clone();

    let limits = RateLimits::new(config.rate_limit_per_minute, config.auth_rate_limit_per_minute);
    let cleanup = limits.clone();
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup.retain_recent();
        }
    });

    log::info!(
        "Starting {} v{} ({}) at {}",
        config.app_name,
        config.app_version,
        config.environment,
        config.server_url()
    );

    let origins = config.cors_origins.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(RequestMetrics::new(monitor.clone()))
            .wrap(RateLimit::new(limits.clone()))
            .wrap(Logger::default())
            .wrap(cors(&origins))
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
