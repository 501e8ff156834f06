//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BrokerKind, ConfigError, DatabaseConfig, Environment, JwtConfig,
    RedisConfig, ServerConfig, SessionConfig, StoreKind,
};
