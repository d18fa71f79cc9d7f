mod config;
mod error;
mod forms;
mod front;
mod ledger;
mod migration;
pub mod models;
mod store;
mod workspaces;

use std::sync::Arc;

use env_logger::Env;
use sqlx::postgres::PgPoolOptions;

use config::{Config, StorageKind};
use store::{memory::MemoryStore, postgres::PgStore, Stores};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    env_logger::try_init_from_env(Env::default().default_filter_or("fintrack=info"))?;

    let stores = match config.storage {
        StorageKind::Postgres => {
            let url = config.database_url.as_deref().unwrap_or_default();
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await?;

            migration::migrate(&pool, &config.migrations_dir).await?;
            Stores::from_backend(Arc::new(PgStore::new(pool)))
        }
        StorageKind::Memory => {
            log::warn!("using in-memory storage, nothing survives a restart");
            Stores::from_backend(Arc::new(MemoryStore::new()))
        }
    };

    front::start_web_server(&config, stores).await
}
