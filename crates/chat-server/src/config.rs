//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use messaging::GatewayConfig;

/// Chat server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Directory uploaded images are written to.
    pub uploads_dir: PathBuf,
    /// Allowed CORS origin, `*` for any.
    pub client_origin: String,
    /// Realtime gateway switches.
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CHAT_ADDR` | Server bind address | `127.0.0.1:5000` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:chat.db?mode=rwc` |
    /// | `DB_POOL_SIZE` | Connection pool size | `20` |
    /// | `UPLOADS_DIR` | Image upload directory | `public/uploads` |
    /// | `CLIENT_ORIGIN` | Allowed CORS origin | `*` |
    /// | `GATEWAY_REPORT_ERRORS` | Send `error` events for rejected events | `false` |
    /// | `GATEWAY_FANOUT_REST_SENDS` | Broadcast REST sends | `true` |
    /// | `GATEWAY_ENFORCE_MEMBERSHIP` | Participant checks on join/send | `false` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = lookup("CHAT_ADDR")
            .unwrap_or_else(|| "127.0.0.1:5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            lookup("SQLITE_PATH").unwrap_or_else(|| "sqlite:chat.db?mode=rwc".to_string());

        let pool_size = match lookup("DB_POOL_SIZE") {
            Some(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber("DB_POOL_SIZE"))?,
            None => database::Database::DEFAULT_POOL_SIZE,
        };

        let uploads_dir = lookup("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("public/uploads"));

        let client_origin = lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string());

        let defaults = GatewayConfig::default();
        let gateway = GatewayConfig {
            report_errors: flag(&lookup, "GATEWAY_REPORT_ERRORS", defaults.report_errors)?,
            fanout_rest_sends: flag(&lookup, "GATEWAY_FANOUT_REST_SENDS", defaults.fanout_rest_sends)?,
            enforce_membership: flag(
                &lookup,
                "GATEWAY_ENFORCE_MEMBERSHIP",
                defaults.enforce_membership,
            )?,
        };

        Ok(Self {
            addr,
            database_url,
            pool_size,
            uploads_dir,
            client_origin,
            gateway,
        })
    }
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag(key)),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CHAT_ADDR format")]
    InvalidAddr,

    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),

    #[error("{0} must be true or false")]
    InvalidFlag(&'static str),

    #[error("Invalid CLIENT_ORIGIN: {0}")]
    InvalidOrigin(String),
}
