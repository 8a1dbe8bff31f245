mod auth;
mod cors;
mod database;
mod geoip;
mod images;
mod logging;
mod rate_limit;
mod server;
mod url;

pub use self::auth::AuthConfig;
pub use self::cors::CorsConfig;
pub use self::database::{DatabaseConfig, StoreBackend};
pub use self::geoip::GeoIpConfig;
pub use self::images::ImageHostConfig;
pub use self::logging::LogFormat;
pub use self::rate_limit::RateLimitConfig;
pub use self::server::ServerConfig;
pub use self::url::UrlConfig;

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub url: UrlConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub geoip: GeoIpConfig,
    pub images: ImageHostConfig,
    pub log_format: LogFormat,
}

/// Read `key`, falling back to `default`, and parse it.
fn env_or<T>(key: &str, default: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .map_err(|e| AppError::Configuration(format!("Invalid {}: {}", key, e)))
}

/// Read an optional variable; empty values count as unset.
fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_opt_parse<T>(key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse()
                .map_err(|e| AppError::Configuration(format!("Invalid {}: {}", key, e)))
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_or("SERVER_PORT", "3000")?;

        let config = Config {
            server: ServerConfig {
                max_body_bytes: env_or("MAX_BODY_BYTES", "5242880")?,
                host: host.clone(),
                port,
            },
            database: DatabaseConfig {
                backend: env_or("STORE_BACKEND", "postgres")?,
                url: env_opt("DATABASE_URL"),
                max_connections: env_or("DB_MAX_CONNECTIONS", "10")?,
                min_connections: env_or("DB_MIN_CONNECTIONS", "1")?,
                acquire_timeout_seconds: env_or("DB_ACQUIRE_TIMEOUT_SECONDS", "30")?,
            },
            url: UrlConfig {
                short_code_length: env_or("SHORT_CODE_LENGTH", "6")?,
                base_url: env_opt("BASE_URL")
                    .unwrap_or_else(|| format!("http://{}:{}", host, port)),
                default_expiry_hours: env_opt_parse("DEFAULT_EXPIRY_HOURS")?,
                short_code_max_attempts: env_or("SHORT_CODE_MAX_ATTEMPTS", "10")?,
                strict_url_validation: env_or("STRICT_URL_VALIDATION", "true")?,
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| AppError::MissingEnvVar("JWT_SECRET".to_string()))?,
                jwt_expiration_hours: env_or("JWT_EXPIRATION_HOURS", "24")?,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: env_or("RATE_LIMIT_PER_MINUTE", "60")?,
                burst_size: env_or("RATE_LIMIT_BURST", "20")?,
            },
            cors: CorsConfig::parse(
                &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            ),
            geoip: GeoIpConfig {
                maxminddb_path: env_opt("GEOIP_DB_PATH"),
                api_url: env_opt("GEOIP_API_URL"),
                timeout_ms: env_or("GEOIP_TIMEOUT_MS", "1500")?,
            },
            images: ImageHostConfig {
                bucket: env_opt("S3_BUCKET"),
                region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: env_opt("S3_ENDPOINT"),
                access_key: env_opt("S3_ACCESS_KEY"),
                secret_key: env_opt("S3_SECRET_KEY"),
                public_url: env_opt("S3_PUBLIC_URL"),
            },
            log_format: env_or("LOG_FORMAT", "pretty")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate every section, reporting the first problem found
    pub fn validate(&self) -> AppResult<()> {
        self.server
            .validate()
            .and_then(|_| self.database.validate())
            .and_then(|_| self.url.validate())
            .and_then(|_| self.auth.validate())
            .and_then(|_| self.rate_limit.validate())
            .and_then(|_| self.geoip.validate())
            .and_then(|_| self.images.validate())
            .map_err(AppError::Configuration)
    }
}
