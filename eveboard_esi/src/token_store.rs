use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use eveboard_core::ids::CharacterId;
use tokio::sync::RwLock;

use crate::{EsiResult, auth::CharacterToken};

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load_token(&self, character_id: CharacterId) -> EsiResult<Option<CharacterToken>>;
    async fn save_token(&self, token: &CharacterToken) -> EsiResult<()>;
    /// Returns whether a token was present.
    async fn delete_token(&self, character_id: CharacterId) -> EsiResult<bool>;
    async fn list_tokens(&self) -> EsiResult<Vec<CharacterToken>>;
}

#[async_trait]
impl<T> TokenStore for Arc<T>
where
    T: TokenStore + ?Sized,
{
    async fn load_token(&self, character_id: CharacterId) -> EsiResult<Option<CharacterToken>> {
        (**self).load_token(character_id).await
    }

    async fn save_token(&self, token: &CharacterToken) -> EsiResult<()> {
        (**self).save_token(token).await
    }

    async fn delete_token(&self, character_id: CharacterId) -> EsiResult<bool> {
        (**self).delete_token(character_id).await
    }

    async fn list_tokens(&self) -> EsiResult<Vec<CharacterToken>> {
        (**self).list_tokens().await
    }
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<CharacterId, CharacterToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load_token(&self, character_id: CharacterId) -> EsiResult<Option<CharacterToken>> {
        Ok(self.tokens.read().await.get(&character_id).cloned())
    }

    async fn save_token(&self, token: &CharacterToken) -> EsiResult<()> {
        self.tokens
            .write()
            .await
            .insert(token.character_id, token.clone());
        Ok(())
    }

    async fn delete_token(&self, character_id: CharacterId) -> EsiResult<bool> {
        Ok(self.tokens.write().await.remove(&character_id).is_some())
    }

    async fn list_tokens(&self) -> EsiResult<Vec<CharacterToken>> {
        let mut tokens = self
            .tokens
            .read()
            .await
            .values()
            .cloned()
            .collect::<Vec<_>>();
        tokens.sort_by_key(|token| token.character_id);
        Ok(tokens)
    }
}
