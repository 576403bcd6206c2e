use std::{path::Path, time::Duration};

use eveboard_core::{ids::CharacterId, time::Timestamp};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use crate::{ResourceCache, SqliteTokenStore, StoreError, SyncJobHistory, TokenCipher};

/// Handle on the sqlite file. Cheap to clone; every accessor shares the pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connect_options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn resource_cache(&self) -> ResourceCache {
        ResourceCache::new(self.pool.clone())
    }

    pub fn token_store(&self, cipher: TokenCipher) -> SqliteTokenStore {
        SqliteTokenStore::new(self.pool.clone(), cipher)
    }

    pub fn job_history(&self) -> SyncJobHistory {
        SyncJobHistory::new(self.pool.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn character_id_to_sqlite(character_id: CharacterId) -> Result<i64, StoreError> {
    i64::try_from(character_id.0).map_err(|_| StoreError::CharacterIdOverflow(character_id.0))
}

pub(crate) fn character_id_from_sqlite(raw: i64) -> Result<CharacterId, StoreError> {
    let value = u64::try_from(raw).map_err(|_| StoreError::NegativeCharacterId(raw))?;
    Ok(CharacterId(value))
}

pub(crate) fn timestamp_from_sqlite(raw: i64) -> Result<Timestamp, StoreError> {
    Timestamp::from_epoch_millis(raw).ok_or(StoreError::InvalidEpochMillis(raw))
}

pub(crate) fn invalid_column(column: &'static str, value: impl ToString) -> StoreError {
    StoreError::InvalidColumn {
        column,
        value: value.to_string(),
    }
}
