pub mod ids;
pub mod jobs;
pub mod mining;
pub mod records;
pub mod sde;
pub mod time;

pub use ids::{
    CategoryId, CharacterId, GroupId, IndustryJobId, ItemId, LocationId, MarketGroupId, SyncJobId,
    TypeId,
};
pub use jobs::{SyncJob, SyncJobKey, SyncJobStatus, UnknownSyncJobStatus};
pub use mining::{MiningProfile, MiningYield, MiningYieldDetails, compute_mining_yield};
pub use records::{
    AssetEntry, AssetRecord, IndustryJobEntry, IndustryJobRecord, ResourceKind, ResourceRows,
    ResourceSnapshot, SnapshotSummary, UnknownResourceKind,
};
pub use sde::{SdeError, SdeGroup, SdeIndex, SdeType, parse_sde_groups, parse_sde_types};
pub use time::Timestamp;
