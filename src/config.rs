use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{anyhow, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind: SocketAddr,
    pub max_connections: u32,
    pub storage: StorageKind,
    pub migrations_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub public_dir: PathBuf,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Reads configuration from the process environment, after loading `.env` if present.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Err(err) = dotenv::dotenv() {
            if !err.not_found() {
                return Err(anyhow!(err)).context("cannot read .env");
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = get("FINTRACK_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("FINTRACK_BIND is not a socket address: '{}'", bind))?;

        let max_connections = match get("FINTRACK_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("FINTRACK_MAX_CONNECTIONS must be a positive integer"))?,
            None => 5,
        };

        let storage = match get("FINTRACK_STORAGE").as_deref() {
            None | Some("postgres") => StorageKind::Postgres,
            Some("memory") => StorageKind::Memory,
            Some(other) => return Err(anyhow!("unknown FINTRACK_STORAGE '{}'", other)),
        };

        let database_url = get("DATABASE_URL");
        if storage == StorageKind::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL is required for postgres storage"));
        }

        Ok(Self {
            database_url,
            bind,
            max_connections,
            storage,
            migrations_dir: get("FINTRACK_MIGRATIONS_DIR")
                .unwrap_or_else(|| "./migrations".to_string())
                .into(),
            templates_dir: get("FINTRACK_TEMPLATES_DIR")
                .unwrap_or_else(|| "./src/front/templates".to_string())
                .into(),
            public_dir: get("FINTRACK_PUBLIC_DIR")
                .unwrap_or_else(|| "./src/front/public".to_string())
                .into(),
            cors_origin: get("FINTRACK_CORS_ORIGIN"),
        })
    }
}
