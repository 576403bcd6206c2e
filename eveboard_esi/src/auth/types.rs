use std::time::Duration;

use eveboard_core::{ids::CharacterId, time::Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginRequest {
    pub authorization_url: String,
    pub state: String,
}

/// Credentials held for one character.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharacterToken {
    pub character_id: CharacterId,
    pub character_name: Option<String>,
    pub scopes: Vec<String>,
    pub access_token: String,
    pub access_expires_at: Timestamp,
    pub refresh_token: String,
    pub updated_at: Timestamp,
}

impl CharacterToken {
    pub fn should_refresh(&self, now: Timestamp, refresh_skew: Duration) -> bool {
        match now.checked_add(refresh_skew) {
            Some(deadline) => self.access_expires_at <= deadline,
            None => true,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.access_expires_at <= now
    }

    pub fn summary(&self) -> TokenSummary {
        TokenSummary {
            character_id: self.character_id,
            character_name: self.character_name.clone(),
            scopes: self.scopes.clone(),
            access_expires_at: self.access_expires_at,
            updated_at: self.updated_at,
        }
    }
}

/// Token metadata without the secrets.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TokenSummary {
    pub character_id: CharacterId,
    pub character_name: Option<String>,
    pub scopes: Vec<String>,
    pub access_expires_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TokenVerification {
    pub character_id: CharacterId,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub expires_at: Timestamp,
}

/// A bearer token known to be usable for upstream calls.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub character_id: CharacterId,
    pub access_token: String,
    pub expires_at: Timestamp,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("character_id", &self.character_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
