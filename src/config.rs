//! Configuration loader for the `iot-dashboard` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, Result};

use crate::error::mask_url_password;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

pub const DEFAULT_TABLE: &str = "iot_dashboard_items";

/// Sliding-window rate limit applied per caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub db_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Table holding every stored item.
    pub table: String,

    /// Upper bound on any single store operation.
    pub store_timeout: Duration,

    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,

    /// Whether 500 responses carry the (redacted) underlying error.
    pub expose_error_details: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_url: None,
            db_pool_max: 5,
            table: DEFAULT_TABLE.to_string(),
            store_timeout: Duration::from_millis(5000),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            rate_limit: Some(RateLimitConfig {
                max_requests: 100,
                window: Duration::from_millis(900_000),
            }),
            expose_error_details: true,
        }
    }
}

/// Whether `name` is safe to splice into SQL as a table identifier.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `DATABASE_URL` – PostgreSQL connection string (unset: in-memory store)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `STORE_TABLE` – items table name (default: `iot_dashboard_items`)
/// - `STORE_TIMEOUT_MS` – per-operation store timeout (default: 5000)
/// - `LISTEN_ADDR` – bind address (default: `0.0.0.0:8080`)
/// - `RATE_LIMIT_MAX` – requests per window per caller, 0 disables (default: 100)
/// - `RATE_LIMIT_WINDOW_MS` – rate limit window (default: 900000)
/// - `APP_ENV` – `production` hides error details (default: `development`)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
    let db_pool_max = u32::try_from(parse_env_u64!("DB_POOL_MAX", 5))
        .map_err(|e| anyhow!("Invalid DB_POOL_MAX: {}", e))?;

    let table = env_or!("STORE_TABLE", DEFAULT_TABLE);
    if !is_valid_table_name(&table) {
        return Err(anyhow!(
            "Invalid STORE_TABLE '{}': expected [a-z_][a-z0-9_]*",
            table
        ));
    }

    let store_timeout = Duration::from_millis(parse_env_u64!("STORE_TIMEOUT_MS", 5000));
    if store_timeout.is_zero() {
        return Err(anyhow!("Invalid STORE_TIMEOUT_MS: must be greater than 0"));
    }

    let listen_addr: SocketAddr = env_or!("LISTEN_ADDR", "0.0.0.0:8080")
        .parse()
        .map_err(|e| anyhow!("Invalid LISTEN_ADDR: {}", e))?;

    let max_requests = parse_env_u64!("RATE_LIMIT_MAX", 100) as usize;
    let window = Duration::from_millis(parse_env_u64!("RATE_LIMIT_WINDOW_MS", 900_000));
    let rate_limit = (max_requests > 0 && !window.is_zero()).then_some(RateLimitConfig {
        max_requests,
        window,
    });

    let expose_error_details = env_or!("APP_ENV", "development") != "production";

    Ok(Config {
        db_url,
        db_pool_max,
        table,
        store_timeout,
        listen_addr,
        rate_limit,
        expose_error_details,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = self
            .db_url
            .as_deref()
            .map(mask_url_password)
            .unwrap_or_else(|| "<unset: in-memory store>".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL     : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX      : {}", self.db_pool_max);
        tracing::info!("  STORE_TABLE      : {}", self.table);
        tracing::info!("  STORE_TIMEOUT_MS : {}", self.store_timeout.as_millis());
        tracing::info!("  LISTEN_ADDR      : {}", self.listen_addr);
        match &self.rate_limit {
            Some(rl) => tracing::info!(
                "  RATE_LIMIT       : {} per {} ms",
                rl.max_requests,
                rl.window.as_millis()
            ),
            None => tracing::info!("  RATE_LIMIT       : disabled"),
        }
        tracing::info!("  ERROR_DETAILS    : {}", self.expose_error_details);
    }
}
