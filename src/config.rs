use std::env;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Lifetimes and signing secret for the four security token kinds.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
    pub verification_ttl: Duration,
}

impl TokenSettings {
    /// Default lifetimes: 15 minutes, 7 days, 1 hour and 24 hours.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            reset_ttl: Duration::hours(1),
            verification_ttl: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_port: u16,
    pub server_host: String,
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    pub tokens: TokenSettings,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub auth_rate_limit_per_minute: u32,
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// A positive token lifetime in the unit `to_duration` converts from.
fn ttl_or(
    key: &'static str,
    default: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    let amount: i64 = parse_or(key, default)?;
    to_duration(amount)
        .filter(|ttl| *ttl > Duration::zero())
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: amount.to_string(),
        })
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

impl Config {
    /// A configuration with every optional setting at its default.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            db_max_connections: 10,
            server_port: 8080,
            server_host: "127.0.0.1".to_string(),
            app_name: "Task Management API".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            tokens: TokenSettings::with_secret(jwt_secret),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
            ],
            rate_limit_per_minute: 100,
            auth_rate_limit_per_minute: 5,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let mut config = Config::new(database_url, required("JWT_SECRET")?);

        let tokens = &mut config.tokens;
        tokens.access_ttl = ttl_or("ACCESS_TOKEN_EXPIRE_MINUTES", 15, Duration::try_minutes)?;
        tokens.refresh_ttl = ttl_or("REFRESH_TOKEN_EXPIRE_DAYS", 7, Duration::try_days)?;
        tokens.reset_ttl = ttl_or("RESET_TOKEN_EXPIRE_HOURS", 1, Duration::try_hours)?;
        tokens.verification_ttl =
            ttl_or("VERIFICATION_TOKEN_EXPIRE_HOURS", 24, Duration::try_hours)?;

        config.bcrypt_cost = parse_or("BCRYPT_COST", config.bcrypt_cost)?;
        if !(4..=31).contains(&config.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: config.bcrypt_cost.to_string(),
            });
        }

        if let Ok(origins) = env::var("BACKEND_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }

        config.db_max_connections = parse_or("DB_MAX_CONNECTIONS", config.db_max_connections)?;
        config.server_port = parse_or("SERVER_PORT", config.server_port)?;
        config.rate_limit_per_minute =
            parse_or("RATE_LIMIT_PER_MINUTE", config.rate_limit_per_minute)?;
        config.auth_rate_limit_per_minute =
            parse_or("AUTH_RATE_LIMIT_PER_MINUTE", config.auth_rate_limit_per_minute)?;

        if let Ok(host) = env::var("SERVER_HOST") {
            config.server_host = host;
        }
        if let Ok(name) = env::var("APP_NAME") {
            config.app_name = name;
        }
        if let Ok(version) = env::var("APP_VERSION") {
            config.app_version = version;
        }
        if let Ok(environment) = env::var("ENVIRONMENT") {
            config.environment = environment;
        }

        Ok(config)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    /// `memory://` selects the in-process store instead of PostgreSQL.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}
