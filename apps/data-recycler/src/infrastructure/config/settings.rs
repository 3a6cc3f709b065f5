//! Recycler Configuration Settings
//!
//! Configuration loaded from environment variables into one immutable value
//! at startup. Validation happens here, before any component starts: an
//! invalid combination fails fast and the server never accepts connections.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::application::sequencer::{ConfigError, ReplayConfig, ReplayMode, types::BASE_INTERVAL};
use crate::infrastructure::broadcast::DEFAULT_TICK_CAPACITY;

/// Configuration error raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an unparseable value.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },

    /// The resulting replay configuration is invalid.
    #[error(transparent)]
    Replay(#[from] ConfigError),
}

/// Server bind settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Bind address for the stream server.
    pub bind_addr: String,
    /// Stream server port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8765,
        }
    }
}

impl ServerSettings {
    /// The `host:port` string to bind.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Complete recycler configuration.
#[derive(Debug, Clone)]
pub struct RecyclerSettings {
    /// Replay session configuration.
    pub replay: ReplayConfig,
    /// Server bind settings.
    pub server: ServerSettings,
    /// Proxy symbol for requested symbols without data.
    pub proxy_symbol: Option<String>,
    /// Tick broadcast channel capacity.
    pub broadcast_capacity: usize,
    /// CSV bar file backing the session's row source.
    pub data_file: Option<PathBuf>,
}

impl RecyclerSettings {
    /// Load and validate configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `RECYCLER_SYMBOLS`: comma-separated symbol list
    ///
    /// ## Optional
    /// - `RECYCLER_MODE`: `single_pass` | `loop` | `date_range` (default: `single_pass`)
    /// - `RECYCLER_SPEED`: speed multiplier (default: 1.0)
    /// - `RECYCLER_LOOP_COUNT`: -1 for infinite, else pass count (default: -1)
    /// - `RECYCLER_START_DATE` / `RECYCLER_END_DATE`: RFC 3339 bounds
    /// - `RECYCLER_PROXY_SYMBOL`: proxy for symbols without data
    /// - `RECYCLER_BIND_ADDR`: bind address (default: 127.0.0.1)
    /// - `RECYCLER_PORT`: port (default: 8765)
    /// - `RECYCLER_BASE_INTERVAL_SECS`: nominal tick spacing (default: 60)
    /// - `RECYCLER_BROADCAST_CAPACITY`: tick channel capacity (default: 1024)
    /// - `RECYCLER_DATA_FILE`: CSV bar file for the bundled source
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` for missing/unparseable variables or an
    /// invalid replay configuration.
    pub fn from_env() -> Result<Self, SettingsError> {
        let symbols_raw = std::env::var("RECYCLER_SYMBOLS")
            .map_err(|_| SettingsError::MissingEnvVar("RECYCLER_SYMBOLS".to_string()))?;
        let symbols = parse_symbols(&symbols_raw);

        let mode = match std::env::var("RECYCLER_MODE") {
            Ok(raw) => ReplayMode::from_str_case_insensitive(&raw).ok_or_else(|| {
                SettingsError::InvalidValue {
                    key: "RECYCLER_MODE".to_string(),
                    value: raw,
                }
            })?,
            Err(_) => ReplayMode::default(),
        };

        let replay = ReplayConfig {
            symbols,
            mode,
            speed_multiplier: parse_env_or("RECYCLER_SPEED", 1.0)?,
            loop_count: parse_env_or("RECYCLER_LOOP_COUNT", -1)?,
            start_date: parse_env_date("RECYCLER_START_DATE")?,
            end_date: parse_env_date("RECYCLER_END_DATE")?,
            base_interval: Duration::from_secs(parse_env_or(
                "RECYCLER_BASE_INTERVAL_SECS",
                BASE_INTERVAL.as_secs(),
            )?),
        };
        replay.validate()?;

        let server = ServerSettings {
            bind_addr: std::env::var("RECYCLER_BIND_ADDR")
                .unwrap_or_else(|_| ServerSettings::default().bind_addr),
            port: parse_env_or("RECYCLER_PORT", ServerSettings::default().port)?,
        };

        Ok(Self {
            replay,
            server,
            proxy_symbol: std::env::var("RECYCLER_PROXY_SYMBOL").ok(),
            broadcast_capacity: parse_env_or("RECYCLER_BROADCAST_CAPACITY", DEFAULT_TICK_CAPACITY)?,
            data_file: std::env::var("RECYCLER_DATA_FILE").ok().map(PathBuf::from),
        })
    }
}

/// Split a comma-separated symbol list, trimming and dropping empties.
#[must_use]
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .collect()
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, SettingsError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|_| SettingsError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_date(key: &str) -> Result<Option<DateTime<Utc>>, SettingsError> {
    match std::env::var(key) {
        Ok(value) => DateTime::parse_from_rfc3339(&value)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| SettingsError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
