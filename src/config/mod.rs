use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub admin_token: Option<String>,
    pub pusher: Option<PusherConfig>,
    pub pusher_timeout_seconds: u64,
}

/// Credentials for the hosted pub/sub app. Only built when all four are set.
#[derive(Clone, Debug)]
pub struct PusherConfig {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    pub cluster: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_addr: env_or_parse("HTTP_ADDR", "0.0.0.0:8080")?,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            admin_token: env_non_empty("ADMIN_TOKEN"),
            pusher: PusherConfig::from_env(),
            pusher_timeout_seconds: env_or_parse("PUSHER_TIMEOUT_SECONDS", "5")?,
        })
    }
}

impl PusherConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            app_id: env_non_empty("PUSHER_APP_ID")?,
            key: env_non_empty("PUSHER_KEY")?,
            secret: env_non_empty("PUSHER_SECRET")?,
            cluster: env_non_empty("PUSHER_CLUSTER")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
