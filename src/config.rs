use std::{env, str::FromStr, time::Duration};

use derive_more::Display;

use crate::service::notification::DispatcherConfig;

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "environment variable '{}' must be set", _0)]
    Missing(&'static str),

    #[display(fmt = "environment variable '{}' has an invalid value '{}'", _0, _1)]
    Invalid(&'static str, String),
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// Empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub dispatcher: DispatcherConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let dispatcher = DispatcherConfig {
            workers: positive(
                parse_or(&lookup, "NOTIFICATION_WORKERS", 4usize)?,
                "NOTIFICATION_WORKERS",
            )?,
            queue_capacity: positive(
                parse_or(&lookup, "NOTIFICATION_QUEUE_CAPACITY", 1024usize)?,
                "NOTIFICATION_QUEUE_CAPACITY",
            )?,
            max_attempts: positive(
                parse_or(&lookup, "NOTIFICATION_MAX_ATTEMPTS", 3u32)?,
                "NOTIFICATION_MAX_ATTEMPTS",
            )?,
            retry_backoff: Duration::from_millis(parse_or(
                &lookup,
                "NOTIFICATION_RETRY_BACKOFF_MS",
                200u64,
            )?),
            enqueue_timeout: Duration::from_millis(parse_or(
                &lookup,
                "NOTIFICATION_ENQUEUE_TIMEOUT_MS",
                500u64,
            )?),
        };
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080u16)?,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?,
            jwt_secret,
            token_ttl: Duration::from_secs(parse_or(&lookup, "TOKEN_TTL_SECS", 3600u64)?),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            dispatcher,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
    }
}

fn positive<T>(value: T, key: &'static str) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(key, value.to_string()))
    }
}
