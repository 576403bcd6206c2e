use std::{path::Path, sync::Arc};

use eveboard_core::{
    ids::{CharacterId, GroupId, SyncJobId, TypeId},
    jobs::SyncJob,
    records::{AssetRecord, IndustryJobRecord, ResourceKind, ResourceSnapshot},
    sde::{SdeGroup, SdeIndex, SdeType},
    time::Timestamp,
};
use eveboard_esi::{
    EsiApiClient, LoginRequest, SsoAuthClient, TokenManager, TokenStore, TokenSummary,
    TokenVerification,
};
use eveboard_store::{Database, Page, ResourceCache, TokenCipher};
use log::info;
use serde::Serialize;
use tokio::sync::watch;

use crate::{
    AppError, DashboardAggregator, DashboardOverview, SyncConfig, SyncJobQueue, SyncWorkerPool,
};

pub type SharedTokenManager = Arc<TokenManager<Arc<dyn SsoAuthClient>, Arc<dyn TokenStore>>>;

const SDE_TYPES_FILE: &str = "types.jsonl";
const SDE_GROUPS_FILE: &str = "groups.jsonl";

/// One page of a cached snapshot. `synced_at` is `None` until the first
/// successful sync.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CachedRecords<T> {
    pub records: Vec<T>,
    pub total_records: u64,
    pub synced_at: Option<Timestamp>,
}

impl<T> CachedRecords<T> {
    fn from_snapshot(snapshot: Option<ResourceSnapshot<T>>) -> Self {
        match snapshot {
            Some(snapshot) => Self {
                records: snapshot.records,
                total_records: snapshot.total_records,
                synced_at: Some(snapshot.synced_at),
            },
            None => Self {
                records: Vec::new(),
                total_records: 0,
                synced_at: None,
            },
        }
    }
}

/// Everything the HTTP layer and CLI need, wired once at startup.
#[derive(Clone)]
pub struct AppRuntime {
    tokens: SharedTokenManager,
    queue: Arc<SyncJobQueue>,
    cache: ResourceCache,
    sde: Arc<SdeIndex>,
    dashboard: Arc<DashboardAggregator>,
    workers: Arc<SyncWorkerPool>,
}

impl AppRuntime {
    pub fn from_database(
        database: &Database,
        token_cipher: TokenCipher,
        sso: Arc<dyn SsoAuthClient>,
        api: Arc<dyn EsiApiClient>,
        sde: Arc<SdeIndex>,
        required_scopes: Vec<String>,
        config: SyncConfig,
    ) -> Self {
        let token_store: Arc<dyn TokenStore> = Arc::new(database.token_store(token_cipher));
        let tokens: SharedTokenManager = Arc::new(TokenManager::new(
            sso,
            Arc::clone(&token_store),
            required_scopes,
        ));
        let cache = database.resource_cache();
        let queue = Arc::new(SyncJobQueue::new(token_store, database.job_history()));
        let dashboard = Arc::new(DashboardAggregator::new(
            Arc::clone(&tokens),
            cache.clone(),
            Arc::clone(&queue),
            Arc::clone(&sde),
        ));
        let workers = Arc::new(SyncWorkerPool::new(
            Arc::clone(&queue),
            Arc::clone(&tokens),
            api,
            cache.clone(),
            config,
        ));

        Self {
            tokens,
            queue,
            cache,
            sde,
            dashboard,
            workers,
        }
    }

    pub fn tokens(&self) -> &SharedTokenManager {
        &self.tokens
    }

    pub fn queue(&self) -> &Arc<SyncJobQueue> {
        &self.queue
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn sde(&self) -> &SdeIndex {
        &self.sde
    }

    pub async fn run_workers_until_shutdown(&self, shutdown_rx: watch::Receiver<bool>) {
        self.workers.run_until_shutdown(shutdown_rx).await;
    }

    pub fn begin_login(&self) -> Result<LoginRequest, AppError> {
        Ok(self.tokens.begin_login()?)
    }

    pub async fn complete_login(&self, code: &str, state: &str) -> Result<TokenSummary, AppError> {
        Ok(self.tokens.complete_login(code, state).await?.summary())
    }

    pub async fn verify_token(
        &self,
        character_id: CharacterId,
    ) -> Result<TokenVerification, AppError> {
        Ok(self.tokens.verify(character_id).await?)
    }

    pub async fn refresh_token(&self, character_id: CharacterId) -> Result<TokenSummary, AppError> {
        Ok(self.tokens.refresh(character_id).await?.summary())
    }

    pub async fn enqueue_sync(
        &self,
        character_id: CharacterId,
        resource_kind: ResourceKind,
    ) -> Result<SyncJob, AppError> {
        self.queue.enqueue(character_id, resource_kind).await
    }

    pub async fn job_status(&self, job_id: SyncJobId) -> Result<SyncJob, AppError> {
        self.queue.job_status(job_id).await
    }

    pub async fn assets(
        &self,
        character_id: CharacterId,
        page: Page,
    ) -> Result<CachedRecords<AssetRecord>, AppError> {
        let snapshot = self
            .cache
            .read_assets(character_id, page)
            .await?
            .map(|snapshot| {
                snapshot.map_records(|mut record| {
                    record.type_name = self.type_name(record.type_id);
                    record
                })
            });
        Ok(CachedRecords::from_snapshot(snapshot))
    }

    pub async fn industry_jobs(
        &self,
        character_id: CharacterId,
        page: Page,
    ) -> Result<CachedRecords<IndustryJobRecord>, AppError> {
        let snapshot = self
            .cache
            .read_industry_jobs(character_id, page)
            .await?
            .map(|snapshot| {
                snapshot.map_records(|mut record| {
                    record.type_name = self.type_name(record.type_id);
                    record
                })
            });
        Ok(CachedRecords::from_snapshot(snapshot))
    }

    pub fn sde_type(&self, type_id: TypeId) -> Result<SdeType, AppError> {
        Ok(self.sde.lookup(type_id)?.clone())
    }

    pub fn sde_group(&self, group_id: GroupId) -> Result<SdeGroup, AppError> {
        Ok(self.sde.lookup_group(group_id)?.clone())
    }

    pub async fn overview(&self) -> Result<DashboardOverview, AppError> {
        self.dashboard.overview().await
    }

    fn type_name(&self, type_id: TypeId) -> Option<String> {
        self.sde.type_name(type_id).map(str::to_owned)
    }
}

/// Reads `types.jsonl` and, when present, `groups.jsonl` from `dir`.
pub async fn load_sde_index(dir: impl AsRef<Path>) -> Result<SdeIndex, AppError> {
    let dir = dir.as_ref();
    let types_path = dir.join(SDE_TYPES_FILE);
    let types = tokio::fs::read_to_string(&types_path)
        .await
        .map_err(|source| AppError::SdeFile {
            path: types_path.display().to_string(),
            source,
        })?;

    let groups_path = dir.join(SDE_GROUPS_FILE);
    let groups = match tokio::fs::read_to_string(&groups_path).await {
        Ok(groups) => Some(groups),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(AppError::SdeFile {
                path: groups_path.display().to_string(),
                source,
            });
        }
    };

    let index = SdeIndex::from_jsonl(&types, groups.as_deref())?;
    info!(
        "loaded {} sde types and {} groups from {}",
        index.type_count(),
        index.group_count(),
        dir.display()
    );
    Ok(index)
}
