use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::dispatch::DEFAULT_STORE_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Rows live in process memory and vanish on exit.
    Memory,
    /// SQLite database at `DATABASE_URL`.
    Sqlite,
}

impl StoreBackend {
    fn from_env(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "memory" | "mem" | "inmemory" => Ok(Self::Memory),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(anyhow::anyhow!("STORE_BACKEND must be one of: memory, sqlite")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    pub store_timeout: Duration,
    /// Overrides the token generator's built-in salt.
    pub token_salt: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let store_backend = StoreBackend::from_env(
            &env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
        )?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lug_directory.db?mode=rwc".to_string());

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid u32")?;

        let store_timeout = match env::var("STORE_TIMEOUT_MS") {
            Ok(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .context("STORE_TIMEOUT_MS must be a whole number of milliseconds")?,
            ),
            Err(_) => DEFAULT_STORE_TIMEOUT,
        };

        let token_salt = env::var("TOKEN_SALT").ok().filter(|salt| !salt.is_empty());

        Ok(Self {
            host,
            port,
            store_backend,
            database_url,
            db_max_connections,
            store_timeout,
            token_salt,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
