//! Configuration management

use anyhow::{self, Context, Result};

/// Default upload limit for spreadsheet imports (10 MiB)
pub const DEFAULT_IMPORT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Shared secret for validating identity-provider tokens
    pub jwt_secret: String,

    /// Directory for the rolling log file
    pub logs_dir: String,

    /// Largest spreadsheet accepted for import, in bytes
    pub import_max_file_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let nats_user = std::env::var("NATS_USER").ok().filter(|u| !u.is_empty());
        let nats_password = std::env::var("NATS_PASSWORD").ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set to the identity provider's signing secret")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes)",
                jwt_secret.len()
            );
        }

        let logs_dir = logs_dir();

        let import_max_file_bytes = match std::env::var("IMPORT_MAX_FILE_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("IMPORT_MAX_FILE_BYTES is not a byte count: {}", raw))?,
            Err(_) => DEFAULT_IMPORT_MAX_FILE_BYTES,
        };

        Ok(Self {
            nats_url,
            nats_user,
            nats_password,
            database_url,
            jwt_secret,
            logs_dir,
            import_max_file_bytes,
        })
    }
}

/// Logs directory - LOGS_DIR or ../logs (relative to the worker)
pub fn logs_dir() -> String {
    std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string())
}
