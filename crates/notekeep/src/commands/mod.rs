//! CLI command implementations, one module per verb.

pub mod apply_cmd;
pub mod ask_cmd;
pub mod index_cmd;
pub mod notes;
pub mod search_cmd;
pub mod suggest_cmd;

use anyhow::Result;

use notekeep_core::maintenance::Stores;

use crate::config::Config;
use crate::db;
use crate::embedding::Providers;
use crate::sqlite_store::SqliteStore;

/// Everything a command needs: the SQLite store and the provider
/// registry, opened once per invocation.
pub(crate) struct App {
    pub store: SqliteStore,
    pub providers: Providers,
}

impl App {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self {
            store: SqliteStore::new(pool),
            providers: Providers::from_config(config)?,
        })
    }

    pub fn stores(&self) -> Stores<'_> {
        Stores {
            users: &self.store,
            documents: &self.store,
            index_blobs: &self.store,
            ledger: &self.store,
        }
    }
}
