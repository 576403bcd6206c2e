use std::sync::Arc;

use async_trait::async_trait;
use eveboard_core::{
    ids::CharacterId,
    records::{AssetEntry, IndustryJobEntry, ResourceKind, ResourceRows},
    time::Timestamp,
};

use crate::{EsiResult, api::VerifiedCharacter};

/// Access/refresh pair issued by the SSO token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub access_expires_at: Timestamp,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_expires_at", &self.access_expires_at)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait SsoAuthClient: Send + Sync {
    fn authorize_url(&self, state: &str) -> EsiResult<String>;
    async fn exchange_code(&self, code: &str) -> EsiResult<TokenGrant>;
    async fn refresh(&self, refresh_token: &str) -> EsiResult<TokenGrant>;
    async fn verify(&self, access_token: &str) -> EsiResult<VerifiedCharacter>;
}

#[async_trait]
pub trait EsiApiClient: Send + Sync {
    async fn fetch_assets(
        &self,
        character_id: CharacterId,
        access_token: &str,
    ) -> EsiResult<Vec<AssetEntry>>;

    async fn fetch_industry_jobs(
        &self,
        character_id: CharacterId,
        access_token: &str,
    ) -> EsiResult<Vec<IndustryJobEntry>>;

    async fn fetch_resource(
        &self,
        kind: ResourceKind,
        character_id: CharacterId,
        access_token: &str,
    ) -> EsiResult<ResourceRows> {
        match kind {
            ResourceKind::Assets => self
                .fetch_assets(character_id, access_token)
                .await
                .map(ResourceRows::Assets),
            ResourceKind::IndustryJobs => self
                .fetch_industry_jobs(character_id, access_token)
                .await
                .map(ResourceRows::IndustryJobs),
        }
    }
}

#[async_trait]
impl<T> SsoAuthClient for Arc<T>
where
    T: SsoAuthClient + ?Sized,
{
    fn authorize_url(&self, state: &str) -> EsiResult<String> {
        (**self).authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> EsiResult<TokenGrant> {
        (**self).exchange_code(code).await
    }

    async fn refresh(&self, refresh_token: &str) -> EsiResult<TokenGrant> {
        (**self).refresh(refresh_token).await
    }

    async fn verify(&self, access_token: &str) -> EsiResult<VerifiedCharacter> {
        (**self).verify(access_token).await
    }
}

#[async_trait]
impl<T> EsiApiClient for Arc<T>
where
    T: EsiApiClient + ?Sized,
{
    async fn fetch_assets(
        &self,
        character_id: CharacterId,
        access_token: &str,
    ) -> EsiResult<Vec<AssetEntry>> {
        (**self).fetch_assets(character_id, access_token).await
    }

    async fn fetch_industry_jobs(
        &self,
        character_id: CharacterId,
        access_token: &str,
    ) -> EsiResult<Vec<IndustryJobEntry>> {
        (**self).fetch_industry_jobs(character_id, access_token).await
    }
}
