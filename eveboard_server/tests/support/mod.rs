#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use eveboard_app::{AppRuntime, SyncConfig};
use eveboard_core::{
    ids::CharacterId,
    records::{AssetEntry, IndustryJobEntry},
    sde::SdeIndex,
    time::Timestamp,
};
use eveboard_esi::{
    CharacterToken, EsiApiClient, EsiError, EsiResult, SsoAuthClient, TokenGrant,
    VerifiedCharacter,
};
use eveboard_store::{Database, TokenCipher};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const CHARACTER: CharacterId = CharacterId(1001);
pub const ASSETS_SCOPE: &str = "esi-assets.read_assets.v1";

const SDE_TYPES: &str = r#"{"_key": 34, "name": {"en": "Tritanium"}, "groupID": 18, "basePrice": 2.0}"#;
const SDE_GROUPS: &str = r#"{"_key": 18, "name": {"en": "Mineral"}, "categoryID": 4}"#;

/// SSO double whose refresh grant always reports a revoked token.
pub struct RevokedSso;

#[async_trait]
impl SsoAuthClient for RevokedSso {
    fn authorize_url(&self, state: &str) -> EsiResult<String> {
        Ok(format!("https://sso.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> EsiResult<TokenGrant> {
        Err(EsiError::TokenInvalid {
            reason: "invalid_grant".to_owned(),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> EsiResult<TokenGrant> {
        Err(EsiError::TokenInvalid {
            reason: "invalid_grant".to_owned(),
        })
    }

    async fn verify(&self, _access_token: &str) -> EsiResult<VerifiedCharacter> {
        Ok(VerifiedCharacter {
            character_id: CHARACTER,
            character_name: Some("Pilot".to_owned()),
            scopes: vec![ASSETS_SCOPE.to_owned()],
            expires_on: None,
        })
    }
}

pub struct EmptyEsi;

#[async_trait]
impl EsiApiClient for EmptyEsi {
    async fn fetch_assets(
        &self,
        _character_id: CharacterId,
        _access_token: &str,
    ) -> EsiResult<Vec<AssetEntry>> {
        Ok(Vec::new())
    }

    async fn fetch_industry_jobs(
        &self,
        _character_id: CharacterId,
        _access_token: &str,
    ) -> EsiResult<Vec<IndustryJobEntry>> {
        Ok(Vec::new())
    }
}

pub struct TestHarness {
    _temp_dir: TempDir,
    pub runtime: AppRuntime,
    pub router: Router,
}

impl TestHarness {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let database = Database::connect(temp_dir.path().join("eveboard.sqlite"))
            .await
            .expect("connect store");
        let sde = SdeIndex::from_jsonl(SDE_TYPES, Some(SDE_GROUPS)).expect("sde parses");
        let token_cipher = TokenCipher::from_base64(&TokenCipher::generate_key()).expect("key");
        let runtime = AppRuntime::from_database(
            &database,
            token_cipher,
            Arc::new(RevokedSso),
            Arc::new(EmptyEsi),
            Arc::new(sde),
            vec![ASSETS_SCOPE.to_owned()],
            SyncConfig::default(),
        );
        let router = eveboard_server::http::router(runtime.clone());

        Self {
            _temp_dir: temp_dir,
            runtime,
            router,
        }
    }

    pub async fn store_token(&self) {
        let now = Timestamp::now();
        let token = CharacterToken {
            character_id: CHARACTER,
            character_name: Some("Pilot".to_owned()),
            scopes: vec![ASSETS_SCOPE.to_owned()],
            access_token: "access-0".to_owned(),
            access_expires_at: Timestamp::from_epoch_secs(now.as_epoch_secs() + 3_600)
                .expect("valid"),
            refresh_token: "refresh-0".to_owned(),
            updated_at: now,
        };
        self.runtime
            .tokens()
            .store()
            .save_token(&token)
            .await
            .expect("save token");
    }

    pub async fn send(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send_raw(method, uri).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json body")
        };
        (status, json)
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, headers, body.to_vec())
    }
}
