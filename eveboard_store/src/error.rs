#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("character id {0} does not fit into sqlite INTEGER")]
    CharacterIdOverflow(u64),

    #[error("character id {0} is negative in sqlite record")]
    NegativeCharacterId(i64),

    #[error("invalid epoch millis {0} in sqlite record")]
    InvalidEpochMillis(i64),

    #[error("invalid {column} '{value}' in sqlite record")]
    InvalidColumn { column: &'static str, value: String },

    #[error("invalid token key: {0}")]
    TokenKey(String),

    #[error("token column could not be processed: {0}")]
    TokenCipher(&'static str),

    #[error("payload serialization failed: {0}")]
    PayloadSerialization(#[from] serde_json::Error),
}
