//! Runtime settings read from the environment (and `.env`).

use anyhow::{Context, anyhow};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://study_chat.db?mode=rwc";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
const DEFAULT_ANSWER_TIMEOUT_SECS: u64 = 30;

/// Where conversations and messages are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!(
                "unknown STORE_BACKEND `{other}`, expected `sqlite` or `memory`"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: SocketAddr,
    pub store_backend: StoreBackend,
    pub allowed_origins: Vec<String>,
    pub answer_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Settings> {
        dotenvy::dotenv().ok();

        let bind_address = var_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS);
        let bind_address = bind_address
            .parse()
            .with_context(|| format!("invalid BIND_ADDRESS `{bind_address}`"))?;

        let store_backend = var_or("STORE_BACKEND", "sqlite").parse()?;

        let answer_timeout = match env::var("ANSWER_TIMEOUT_SECS") {
            Ok(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("invalid ANSWER_TIMEOUT_SECS `{secs}`"))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_ANSWER_TIMEOUT_SECS),
        };

        Ok(Settings {
            database_url: Self::database_url_from_env(),
            bind_address,
            store_backend,
            allowed_origins: parse_origins(&var_or("ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS)),
            answer_timeout,
        })
    }

    pub fn database_url_from_env() -> String {
        dotenvy::dotenv().ok();
        var_or("DATABASE_URL", DEFAULT_DATABASE_URL)
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}
