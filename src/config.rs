use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Fmt,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Required only for the postgres backend.
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub db_max_connections: u32,
    pub stuck_saga_threshold_secs: u64,
    pub event_channel_capacity: usize,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let store_backend: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url,
            store_backend,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            stuck_saga_threshold_secs: env::var("STUCK_SAGA_THRESHOLD_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            event_channel_capacity: env::var("EVENT_CHANNEL_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()?,
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Fmt,
            },
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))
    }

    pub fn stuck_saga_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stuck_saga_threshold_secs as i64)
    }
}
