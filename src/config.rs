// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;

/// Seconds into an exam before the first re-verification falls due.
pub const FIRST_CHECK_OFFSET_SECS: u32 = 300;

/// Bounds (inclusive) of the random gap between two re-verifications.
pub const RECHECK_MIN_SECS: u32 = 420;
pub const RECHECK_MAX_SECS: u32 = 600;

/// Below this many remaining seconds the clock is flagged as running low.
pub const LOW_TIME_THRESHOLD_SECS: u32 = 300;

/// A result passes when strictly more than this share of answers is correct.
pub const PASS_THRESHOLD_PERCENTAGE: f64 = 50.0;

/// Upper bound for one decoded verification photo.
pub const MAX_CAPTURE_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_DATABASE_URL: &str = "sqlite://exam_portal.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8800";
const DEFAULT_JWT_EXPIRATION: u64 = 60 * 60 * 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiration = match env::var("JWT_EXPIRATION") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("JWT_EXPIRATION", raw))?,
            Err(_) => DEFAULT_JWT_EXPIRATION,
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let raw_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("BIND_ADDR", raw_addr.clone()))?;

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:8080".to_string(),
                    "http://127.0.0.1:8080".to_string(),
                ]
            });

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            cors_origins,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
