//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub store: StoreKind,
    pub broker: BrokerKind,
    /// Present when `store` is [`StoreKind::Postgres`]
    pub database: Option<DatabaseConfig>,
    /// Present when `broker` is [`BrokerKind::Redis`]
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Where rooms and messages are read from and written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgres,
    /// Process-local store; for tests and local runs
    Memory,
}

/// Which group-messaging backend fans messages out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrokerKind {
    /// Cross-process fan-out over Redis pub/sub
    #[default]
    Redis,
    /// Single-process fan-out
    Local,
}

/// Server bind configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of tokens minted by [`JwtService::issue_access_token`](crate::JwtService::issue_access_token)
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
}

/// Per-connection tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_outbound_queue_capacity(),
            ping_interval_secs: default_ping_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-gateway".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_access_token_expiry() -> i64 {
    900 // 15 minutes
}

fn default_outbound_queue_capacity() -> usize {
    256
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    90
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// Returns an error if a required key is missing or a value cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|s| {
                    s.parse::<u64>()
                        .map_err(|_| ConfigError::InvalidValue(key, s))
                })
                .transpose()
        };

        let store = match lookup("STORE") {
            None => StoreKind::default(),
            Some(s) => match s.to_lowercase().as_str() {
                "postgres" => StoreKind::Postgres,
                "memory" => StoreKind::Memory,
                _ => return Err(ConfigError::InvalidValue("STORE", s)),
            },
        };

        let broker = match lookup("BROKER") {
            None => BrokerKind::default(),
            Some(s) => match s.to_lowercase().as_str() {
                "redis" => BrokerKind::Redis,
                "local" => BrokerKind::Local,
                _ => return Err(ConfigError::InvalidValue("BROKER", s)),
            },
        };

        let database = match store {
            StoreKind::Memory => None,
            StoreKind::Postgres => Some(DatabaseConfig {
                url: lookup("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?,
                max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_max_connections),
                min_connections: lookup("DATABASE_MIN_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_min_connections),
            }),
        };

        let redis = match broker {
            BrokerKind::Local => None,
            BrokerKind::Redis => Some(RedisConfig {
                url: lookup("REDIS_URL").ok_or(ConfigError::MissingVar("REDIS_URL"))?,
                max_connections: lookup("REDIS_MAX_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_redis_max_connections),
            }),
        };

        let outbound_queue_capacity = parsed("OUTBOUND_QUEUE_CAPACITY")?
            .map_or_else(default_outbound_queue_capacity, |n| n as usize);
        if outbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "OUTBOUND_QUEUE_CAPACITY",
                "0".to_string(),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .as_deref()
                    .and_then(Environment::parse)
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: lookup("GATEWAY_PORT")
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("GATEWAY_PORT"))?,
            },
            store,
            broker,
            database,
            redis,
            jwt: JwtConfig {
                secret: lookup("JWT_SECRET").ok_or(ConfigError::MissingVar("JWT_SECRET"))?,
                access_token_expiry: lookup("JWT_ACCESS_TOKEN_EXPIRY")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_access_token_expiry),
            },
            session: SessionConfig {
                outbound_queue_capacity,
                ping_interval_secs: parsed("PING_INTERVAL_SECS")?
                    .unwrap_or_else(default_ping_interval_secs),
                idle_timeout_secs: parsed("IDLE_TIMEOUT_SECS")?
                    .unwrap_or_else(default_idle_timeout_secs),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
