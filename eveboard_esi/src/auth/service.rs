use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use eveboard_core::{ids::CharacterId, time::Timestamp};
use log::{debug, info, warn};
use rand::{Rng, distributions::Alphanumeric};
use tokio::sync::Mutex as AsyncMutex;

use super::types::{AccessToken, CharacterToken, LoginRequest, TokenVerification};
use crate::{EsiError, EsiResult, client::SsoAuthClient, token_store::TokenStore};

const LOGIN_STATE_LEN: usize = 32;
const LOGIN_STATE_TTL: Duration = Duration::from_secs(600);

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Owns every stored token. Refreshes for one character are serialized so
/// concurrent callers share a single upstream rotation.
pub struct TokenManager<C, S, T = SystemClock>
where
    C: SsoAuthClient,
    S: TokenStore,
    T: Clock,
{
    client: C,
    store: S,
    required_scopes: Vec<String>,
    clock: T,
    refresh_skew: Duration,
    refresh_gates: Mutex<HashMap<CharacterId, Arc<AsyncMutex<()>>>>,
    pending_logins: Mutex<HashMap<String, Timestamp>>,
}

impl<C, S> TokenManager<C, S, SystemClock>
where
    C: SsoAuthClient,
    S: TokenStore,
{
    pub fn new(client: C, store: S, required_scopes: Vec<String>) -> Self {
        Self::with_clock(client, store, required_scopes, SystemClock)
    }
}

impl<C, S, T> TokenManager<C, S, T>
where
    C: SsoAuthClient,
    S: TokenStore,
    T: Clock,
{
    pub fn with_clock(client: C, store: S, required_scopes: Vec<String>, clock: T) -> Self {
        Self {
            client,
            store,
            required_scopes,
            clock,
            refresh_skew: Duration::from_secs(60),
            refresh_gates: Mutex::new(HashMap::new()),
            pending_logins: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh_skew(mut self, refresh_skew: Duration) -> Self {
        self.refresh_skew = refresh_skew;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn begin_login(&self) -> EsiResult<LoginRequest> {
        let now = self.clock.now();
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(LOGIN_STATE_LEN)
            .map(char::from)
            .collect();
        let authorization_url = self.client.authorize_url(&state)?;

        let mut pending = self
            .pending_logins
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, issued_at| {
            issued_at
                .checked_add(LOGIN_STATE_TTL)
                .is_some_and(|deadline| deadline > now)
        });
        pending.insert(state.clone(), now);

        Ok(LoginRequest {
            authorization_url,
            state,
        })
    }

    pub async fn complete_login(&self, code: &str, state: &str) -> EsiResult<CharacterToken> {
        let issued_at = self
            .pending_logins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state);
        let now = self.clock.now();
        let fresh = issued_at
            .and_then(|issued_at| issued_at.checked_add(LOGIN_STATE_TTL))
            .is_some_and(|deadline| deadline > now);
        if !fresh {
            return Err(EsiError::UnknownLoginState(state.to_owned()));
        }

        let grant = self.client.exchange_code(code).await?;
        let verified = self.client.verify(&grant.access_token).await?;

        let missing = missing_required_scopes(&verified.scopes, &self.required_scopes);
        if !missing.is_empty() {
            return Err(EsiError::MissingRequiredScopes { missing });
        }

        let token = CharacterToken {
            character_id: verified.character_id,
            character_name: verified.character_name,
            scopes: verified.scopes,
            access_token: grant.access_token,
            access_expires_at: grant.access_expires_at,
            refresh_token: grant.refresh_token,
            updated_at: now,
        };
        self.store.save_token(&token).await?;
        info!("stored token for character {}", token.character_id);
        Ok(token)
    }

    pub async fn load_token(&self, character_id: CharacterId) -> EsiResult<Option<CharacterToken>> {
        self.store.load_token(character_id).await
    }

    pub async fn require_token(&self, character_id: CharacterId) -> EsiResult<CharacterToken> {
        self.store
            .load_token(character_id)
            .await?
            .ok_or(EsiError::TokenNotFound(character_id))
    }

    pub async fn list_tokens(&self) -> EsiResult<Vec<CharacterToken>> {
        self.store.list_tokens().await
    }

    /// The token most recently written, used as the default dashboard subject.
    pub async fn most_recent_token(&self) -> EsiResult<Option<CharacterToken>> {
        Ok(self
            .store
            .list_tokens()
            .await?
            .into_iter()
            .max_by_key(|token| (token.updated_at, token.character_id)))
    }

    pub async fn remove_token(&self, character_id: CharacterId) -> EsiResult<bool> {
        let removed = self.store.delete_token(character_id).await?;
        self.forget_refresh_gate(character_id);
        Ok(removed)
    }

    /// Reports whether the stored token can be used. Tokens inside the
    /// refresh window are checked upstream as well.
    pub async fn verify(&self, character_id: CharacterId) -> EsiResult<TokenVerification> {
        let token = self.require_token(character_id).await?;
        let now = self.clock.now();
        let verdict = |valid: bool, reason: Option<String>| TokenVerification {
            character_id,
            valid,
            reason,
            expires_at: token.access_expires_at,
        };

        let missing = missing_required_scopes(&token.scopes, &self.required_scopes);
        if !missing.is_empty() {
            return Ok(verdict(
                false,
                Some(EsiError::MissingRequiredScopes { missing }.to_string()),
            ));
        }

        if token.is_expired(now) {
            return Ok(verdict(false, Some("access token expired".to_owned())));
        }

        if !token.should_refresh(now, self.refresh_skew) {
            return Ok(verdict(true, None));
        }

        match self.client.verify(&token.access_token).await {
            Ok(verified) if verified.character_id == character_id => Ok(verdict(true, None)),
            Ok(verified) => Ok(verdict(
                false,
                Some(format!(
                    "token belongs to character {}",
                    verified.character_id
                )),
            )),
            Err(EsiError::TokenInvalid { reason }) => Ok(verdict(false, Some(reason))),
            Err(err) => {
                debug!(
                    "upstream verify for character {character_id} failed, using local expiry: {}",
                    err.display_chain()
                );
                Ok(verdict(true, None))
            }
        }
    }

    /// Rotates the token now. Callers racing on the same character share one
    /// upstream call.
    pub async fn refresh(&self, character_id: CharacterId) -> EsiResult<CharacterToken> {
        let observed = self.require_token(character_id).await?;
        self.rotate(observed).await
    }

    /// Returns an access token that is not inside the refresh window,
    /// refreshing first when needed.
    pub async fn acquire_usable(&self, character_id: CharacterId) -> EsiResult<AccessToken> {
        let token = self.require_token(character_id).await?;
        let now = self.clock.now();
        let token = if token.should_refresh(now, self.refresh_skew) {
            self.rotate(token).await?
        } else {
            token
        };

        Ok(AccessToken {
            character_id,
            access_token: token.access_token,
            expires_at: token.access_expires_at,
        })
    }

    async fn rotate(&self, observed: CharacterToken) -> EsiResult<CharacterToken> {
        let character_id = observed.character_id;
        let gate = self.refresh_gate(character_id);
        let _guard = gate.lock().await;

        // A caller that queued behind a rejected refresh finds the token gone.
        let Some(current) = self.store.load_token(character_id).await? else {
            return Err(EsiError::TokenInvalid {
                reason: "token was removed during a concurrent refresh".to_owned(),
            });
        };
        if current.refresh_token != observed.refresh_token {
            debug!("refresh for character {character_id} already completed by another caller");
            return Ok(current);
        }

        let grant = match self.client.refresh(&current.refresh_token).await {
            Ok(grant) => grant,
            Err(EsiError::TokenInvalid { reason }) => {
                warn!("refresh token for character {character_id} rejected: {reason}");
                self.store.delete_token(character_id).await?;
                self.forget_refresh_gate(character_id);
                return Err(EsiError::TokenInvalid { reason });
            }
            Err(err) => return Err(err),
        };

        let now = self.clock.now();
        let mut access_expires_at = grant.access_expires_at;
        if access_expires_at <= current.access_expires_at {
            warn!(
                "refresh for character {character_id} did not extend expiry ({} <= {})",
                access_expires_at, current.access_expires_at
            );
            access_expires_at = current
                .access_expires_at
                .checked_add(Duration::from_secs(1))
                .ok_or_else(|| EsiError::message("token expiry overflows"))?;
        }

        let rotated = CharacterToken {
            access_token: grant.access_token,
            access_expires_at,
            refresh_token: grant.refresh_token,
            updated_at: now,
            ..current
        };
        self.store.save_token(&rotated).await?;
        debug!(
            "refreshed token for character {character_id}, expires {}",
            rotated.access_expires_at
        );
        Ok(rotated)
    }

    fn refresh_gate(&self, character_id: CharacterId) -> Arc<AsyncMutex<()>> {
        let mut gates = self
            .refresh_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(character_id).or_default())
    }

    /// Callers already queued on the gate keep their own handle to it.
    fn forget_refresh_gate(&self, character_id: CharacterId) {
        self.refresh_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&character_id);
    }
}

fn missing_required_scopes(granted_scopes: &[String], required_scopes: &[String]) -> Vec<String> {
    required_scopes
        .iter()
        .filter(|required| !granted_scopes.iter().any(|granted| granted == *required))
        .cloned()
        .collect()
}
