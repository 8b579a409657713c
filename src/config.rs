// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Prefix of codes issued when a learner completes a course.
pub const CERTIFICATE_CODE_PREFIX: &str = "LUMINA";

/// Prefix of codes issued through the administrative override.
pub const MANUAL_CERTIFICATE_CODE_PREFIX: &str = "MANUAL";

/// Number of base36 characters in each half of a verification code.
pub const CODE_SEGMENT_LENGTH: usize = 4;

/// How many fresh codes to try when the unique constraint on `certificates.code` trips.
pub const CODE_ISSUE_RETRIES: usize = 5;

/// Lifetime of tokens minted by `sign_jwt`, in seconds.
pub const JWT_EXPIRATION_SECONDS: u64 = 60 * 60 * 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub log_dir: String,
    pub admin_name: Option<String>,
    pub admin_email: Option<String>,
}

impl Config {
    /// Reads the configuration from the environment (and `.env`, if present).
    ///
    /// Only `JWT_SECRET` is mandatory. `ADMIN_NAME` and `ADMIN_EMAIL` together seed
    /// an admin account at startup.
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lumina.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET")?;

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let log_dir = env::var("LOG_DIR")
            .unwrap_or_else(|_| "logs".to_string());

        let admin_name = env::var("ADMIN_NAME").ok();
        let admin_email = env::var("ADMIN_EMAIL").ok();

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            log_dir,
            admin_name,
            admin_email,
        })
    }
}
