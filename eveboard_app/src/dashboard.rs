use std::sync::Arc;

use eveboard_core::{
    ids::CharacterId,
    mining::{MiningProfile, MiningYieldDetails, compute_mining_yield},
    sde::SdeIndex,
    time::Timestamp,
};
use eveboard_store::{Page, ResourceCache};
use log::debug;
use serde::Serialize;

use crate::{AppError, SharedTokenManager, SyncJobQueue};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MiningSummary {
    pub character_id: Option<CharacterId>,
    pub yield_per_hour: f64,
    pub details: MiningYieldDetails,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardOverview {
    pub character_id: Option<CharacterId>,
    pub character_name: Option<String>,
    pub token_valid: bool,
    pub net_worth: f64,
    pub asset_count: u64,
    pub assets_synced_at: Option<Timestamp>,
    pub active_jobs: u64,
    pub industry_jobs_synced_at: Option<Timestamp>,
    pub sync_jobs_in_flight: usize,
    pub mining_summary: MiningSummary,
}

/// Read-only view over the most recently updated character.
pub struct DashboardAggregator {
    tokens: SharedTokenManager,
    cache: ResourceCache,
    queue: Arc<SyncJobQueue>,
    sde: Arc<SdeIndex>,
    mining_profile: MiningProfile,
}

impl DashboardAggregator {
    pub fn new(
        tokens: SharedTokenManager,
        cache: ResourceCache,
        queue: Arc<SyncJobQueue>,
        sde: Arc<SdeIndex>,
    ) -> Self {
        Self {
            tokens,
            cache,
            queue,
            sde,
            mining_profile: MiningProfile::default(),
        }
    }

    pub async fn overview(&self) -> Result<DashboardOverview, AppError> {
        let mining = compute_mining_yield(&self.mining_profile);
        let mut overview = DashboardOverview {
            character_id: None,
            character_name: None,
            token_valid: false,
            net_worth: 0.0,
            asset_count: 0,
            assets_synced_at: None,
            active_jobs: 0,
            industry_jobs_synced_at: None,
            sync_jobs_in_flight: self.queue.in_flight_count(),
            mining_summary: MiningSummary {
                character_id: None,
                yield_per_hour: mining.yield_per_hour,
                details: mining.details,
            },
        };

        let Some(token) = self.tokens.most_recent_token().await? else {
            return Ok(overview);
        };
        let character_id = token.character_id;
        overview.character_id = Some(character_id);
        overview.character_name = token.character_name;
        overview.mining_summary.character_id = Some(character_id);
        overview.token_valid = match self.tokens.verify(character_id).await {
            Ok(verification) => verification.valid,
            Err(err) => {
                debug!("token check for dashboard failed: {}", err.display_chain());
                false
            }
        };

        if let Some(assets) = self.cache.read_assets(character_id, Page::ALL).await? {
            overview.asset_count = assets.total_records;
            overview.assets_synced_at = Some(assets.synced_at);
            overview.net_worth = assets
                .records
                .iter()
                .map(|asset| {
                    self.sde.base_price(asset.type_id).unwrap_or(0.0) * asset.quantity as f64
                })
                .sum();
        }

        if let Some(jobs) = self
            .cache
            .read_industry_jobs(character_id, Page::ALL)
            .await?
        {
            overview.industry_jobs_synced_at = Some(jobs.synced_at);
            overview.active_jobs = jobs
                .records
                .iter()
                .filter(|job| job.status == "active")
                .count() as u64;
        }

        Ok(overview)
    }
}
