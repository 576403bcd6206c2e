use async_trait::async_trait;
use eveboard_core::ids::CharacterId;
use eveboard_esi::{CharacterToken, EsiError, EsiResult, TokenStore};
use futures_util::TryStreamExt;
use sqlx::{FromRow, SqlitePool};

use crate::{
    StoreError, TokenCipher,
    db::{character_id_from_sqlite, character_id_to_sqlite, timestamp_from_sqlite},
};

/// Tokens persisted in the `tokens` table. Access and refresh tokens are
/// sealed with the store's key before they reach sqlite.
#[derive(Clone, Debug)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
    cipher: TokenCipher,
}

impl SqliteTokenStore {
    pub(crate) fn new(pool: SqlitePool, cipher: TokenCipher) -> Self {
        Self { pool, cipher }
    }

    pub async fn load(&self, character_id: CharacterId) -> Result<Option<CharacterToken>, StoreError> {
        let row: Option<DbTokenRow> = sqlx::query_as(
            r#"
            SELECT
                character_id,
                character_name,
                scopes_json,
                access_token_sealed,
                access_expires_at_epoch_millis,
                refresh_token_sealed,
                updated_at_epoch_millis
            FROM tokens
            WHERE character_id = ?1
            "#,
        )
        .bind(character_id_to_sqlite(character_id)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.into_token(&self.cipher)).transpose()
    }

    pub async fn save(&self, token: &CharacterToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (
                character_id,
                character_name,
                scopes_json,
                access_token_sealed,
                access_expires_at_epoch_millis,
                refresh_token_sealed,
                updated_at_epoch_millis
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (character_id) DO UPDATE SET
                character_name = excluded.character_name,
                scopes_json = excluded.scopes_json,
                access_token_sealed = excluded.access_token_sealed,
                access_expires_at_epoch_millis = excluded.access_expires_at_epoch_millis,
                refresh_token_sealed = excluded.refresh_token_sealed,
                updated_at_epoch_millis = excluded.updated_at_epoch_millis
            "#,
        )
        .bind(character_id_to_sqlite(token.character_id)?)
        .bind(&token.character_name)
        .bind(serde_json::to_string(&token.scopes)?)
        .bind(self.cipher.seal(&token.access_token)?)
        .bind(token.access_expires_at.as_epoch_millis())
        .bind(self.cipher.seal(&token.refresh_token)?)
        .bind(token.updated_at.as_epoch_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, character_id: CharacterId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE character_id = ?1")
            .bind(character_id_to_sqlite(character_id)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> Result<Vec<CharacterToken>, StoreError> {
        let mut rows = sqlx::query_as::<_, DbTokenRow>(
            r#"
            SELECT
                character_id,
                character_name,
                scopes_json,
                access_token_sealed,
                access_expires_at_epoch_millis,
                refresh_token_sealed,
                updated_at_epoch_millis
            FROM tokens
            ORDER BY character_id ASC
            "#,
        )
        .fetch(&self.pool);

        let mut tokens = Vec::new();
        while let Some(row) = rows.try_next().await? {
            tokens.push(row.into_token(&self.cipher)?);
        }
        Ok(tokens)
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn load_token(&self, character_id: CharacterId) -> EsiResult<Option<CharacterToken>> {
        self.load(character_id).await.map_err(EsiError::token_store)
    }

    async fn save_token(&self, token: &CharacterToken) -> EsiResult<()> {
        self.save(token).await.map_err(EsiError::token_store)
    }

    async fn delete_token(&self, character_id: CharacterId) -> EsiResult<bool> {
        self.delete(character_id).await.map_err(EsiError::token_store)
    }

    async fn list_tokens(&self) -> EsiResult<Vec<CharacterToken>> {
        self.list().await.map_err(EsiError::token_store)
    }
}

#[derive(Debug, FromRow)]
struct DbTokenRow {
    character_id: i64,
    character_name: Option<String>,
    scopes_json: String,
    access_token_sealed: String,
    access_expires_at_epoch_millis: i64,
    refresh_token_sealed: String,
    updated_at_epoch_millis: i64,
}

impl DbTokenRow {
    fn into_token(self, cipher: &TokenCipher) -> Result<CharacterToken, StoreError> {
        Ok(CharacterToken {
            character_id: character_id_from_sqlite(self.character_id)?,
            character_name: self.character_name,
            scopes: serde_json::from_str(&self.scopes_json)?,
            access_token: cipher.open(&self.access_token_sealed)?,
            access_expires_at: timestamp_from_sqlite(self.access_expires_at_epoch_millis)?,
            refresh_token: cipher.open(&self.refresh_token_sealed)?,
            updated_at: timestamp_from_sqlite(self.updated_at_epoch_millis)?,
        })
    }
}
