#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use eveboard_app::{AppRuntime, SyncConfig};
use eveboard_core::{
    ids::{CharacterId, ItemId, LocationId, SyncJobId, TypeId},
    jobs::SyncJob,
    records::{AssetEntry, IndustryJobEntry},
    sde::SdeIndex,
    time::Timestamp,
};
use eveboard_esi::{
    CharacterToken, EsiApiClient, EsiError, EsiResult, SsoAuthClient, TokenGrant,
    VerifiedCharacter,
};
use eveboard_store::{Database, TokenCipher};
use tempfile::TempDir;
use tokio::sync::{broadcast, watch};

pub const CHARACTER: CharacterId = CharacterId(1001);
pub const ASSETS_SCOPE: &str = "esi-assets.read_assets.v1";

const SDE_TYPES: &str = r#"{"_key": 34, "name": {"en": "Tritanium"}, "groupID": 18, "basePrice": 2.0, "volume": 0.01}
{"_key": 35, "name": {"en": "Pyerite"}, "groupID": 18, "basePrice": 5.0, "volume": 0.01}
"#;

pub struct FakeSso {
    pub refresh_calls: AtomicUsize,
    refresh_delay: Duration,
    next_expiry: Mutex<i64>,
}

impl Default for FakeSso {
    fn default() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            refresh_delay: Duration::from_millis(20),
            next_expiry: Mutex::new(Timestamp::now().as_epoch_secs() + 1_200),
        }
    }
}

#[async_trait]
impl SsoAuthClient for FakeSso {
    fn authorize_url(&self, state: &str) -> EsiResult<String> {
        Ok(format!("https://sso.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> EsiResult<TokenGrant> {
        Err(EsiError::message("login is not scripted"))
    }

    async fn refresh(&self, refresh_token: &str) -> EsiResult<TokenGrant> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.refresh_delay).await;
        let expiry = {
            let mut next_expiry = self.next_expiry.lock().expect("lock");
            *next_expiry += 60;
            *next_expiry
        };
        Ok(TokenGrant {
            access_token: format!("access-{call}"),
            access_expires_at: Timestamp::from_epoch_secs(expiry).expect("valid"),
            refresh_token: format!("{refresh_token}-rotated-{call}"),
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

type AssetResult = EsiResult<Vec<AssetEntry>>;

pub struct FakeEsi {
    pub asset_calls: AtomicUsize,
    pub job_calls: AtomicUsize,
    delay: Duration,
    asset_script: Mutex<VecDeque<AssetResult>>,
    asset_fallback: fn() -> AssetResult,
}

impl FakeEsi {
    pub fn new(fallback: fn() -> AssetResult) -> Self {
        Self {
            asset_calls: AtomicUsize::new(0),
            job_calls: AtomicUsize::new(0),
            delay: Duration::from_millis(5),
            asset_script: Mutex::new(VecDeque::new()),
            asset_fallback: fallback,
        }
    }

    pub fn with_script(self, script: Vec<AssetResult>) -> Self {
        *self.asset_script.lock().expect("lock") = script.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn asset_calls(&self) -> usize {
        self.asset_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EsiApiClient for FakeEsi {
    async fn fetch_assets(
        &self,
        _character_id: CharacterId,
        _access_token: &str,
    ) -> EsiResult<Vec<AssetEntry>> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let scripted = self.asset_script.lock().expect("lock").pop_front();
        scripted.unwrap_or_else(self.asset_fallback)
    }

    async fn fetch_industry_jobs(
        &self,
        _character_id: CharacterId,
        _access_token: &str,
    ) -> EsiResult<Vec<IndustryJobEntry>> {
        self.job_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

pub fn two_assets() -> AssetResult {
    Ok(vec![
        AssetEntry {
            item_id: ItemId(1_000_000_001),
            type_id: TypeId(34),
            quantity: 1_000,
            location_id: LocationId(60_003_760),
        },
        AssetEntry {
            item_id: ItemId(1_000_000_002),
            type_id: TypeId(35),
            quantity: 10,
            location_id: LocationId(60_003_760),
        },
    ])
}

pub fn rate_limited() -> AssetResult {
    Err(EsiError::RateLimited { retry_after: None })
}

pub fn token_rejected() -> AssetResult {
    Err(EsiError::TokenInvalid {
        reason: "upstream returned 403 Forbidden".to_owned(),
    })
}

pub fn unavailable() -> AssetResult {
    Err(EsiError::UpstreamUnavailable {
        reason: "upstream returned 502 Bad Gateway".to_owned(),
    })
}

pub fn fast_sync_config() -> SyncConfig {
    SyncConfig {
        workers: 2,
        max_attempts: 3,
        backoff_initial: Duration::from_millis(5),
        backoff_max: Duration::from_millis(20),
        jitter_factor: 0.0,
        fetch_timeout: Duration::from_secs(2),
        ..SyncConfig::default()
    }
}

pub struct TestHarness {
    _temp_dir: TempDir,
    pub runtime: AppRuntime,
    pub sso: Arc<FakeSso>,
    pub esi: Arc<FakeEsi>,
    shutdown_tx: watch::Sender<bool>,
    workers: Option<tokio::task::JoinHandle<()>>,
}

impl TestHarness {
    pub async fn new(esi: FakeEsi) -> Self {
        Self::with_config(esi, fast_sync_config()).await
    }

    pub async fn with_config(esi: FakeEsi, sync_config: SyncConfig) -> Self {
        let _ = pretty_env_logger::formatted_timed_builder()
            .is_test(true)
            .try_init();

        let temp_dir = tempfile::tempdir().expect("tempdir");
        let database = Database::connect(temp_dir.path().join("eveboard.sqlite"))
            .await
            .expect("connect store");
        let sso = Arc::new(FakeSso::default());
        let esi = Arc::new(esi);
        let sde = Arc::new(SdeIndex::from_jsonl(SDE_TYPES, None).expect("sde parses"));
        let token_cipher = TokenCipher::from_base64(&TokenCipher::generate_key()).expect("key");
        let runtime = AppRuntime::from_database(
            &database,
            token_cipher,
            sso.clone(),
            esi.clone(),
            sde,
            vec![ASSETS_SCOPE.to_owned()],
            sync_config,
        );
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            _temp_dir: temp_dir,
            runtime,
            sso,
            esi,
            shutdown_tx,
            workers: None,
        }
    }

    pub async fn store_token(&self, expires_in_secs: i64) -> CharacterToken {
        let now = Timestamp::now();
        let token = CharacterToken {
            character_id: CHARACTER,
            character_name: Some("Pilot".to_owned()),
            scopes: vec![ASSETS_SCOPE.to_owned()],
            access_token: "access-0".to_owned(),
            access_expires_at: Timestamp::from_epoch_secs(now.as_epoch_secs() + expires_in_secs)
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
        token
    }

    pub fn start_workers(&mut self) {
        let runtime = self.runtime.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.workers = Some(tokio::spawn(async move {
            runtime.run_workers_until_shutdown(shutdown_rx).await;
        }));
    }

    pub async fn stop_workers(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(workers) = self.workers.take() {
            tokio::time::timeout(Duration::from_secs(5), workers)
                .await
                .expect("workers stop in time")
                .expect("workers exit cleanly");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncJob> {
        self.runtime.queue().subscribe()
    }
}

/// Collects status events for `job_id` until it reaches a terminal state.
pub async fn wait_for_terminal(
    events: &mut broadcast::Receiver<SyncJob>,
    job_id: SyncJobId,
) -> Vec<SyncJob> {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.expect("event stream open");
            if event.job_id != job_id {
                continue;
            }
            let terminal = event.is_terminal();
            seen.push(event);
            if terminal {
                return seen;
            }
        }
    })
    .await
    .expect("job reaches a terminal state in time")
}
