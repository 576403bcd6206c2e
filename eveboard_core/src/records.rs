use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    ids::{IndustryJobId, ItemId, LocationId, TypeId},
    time::Timestamp,
};

/// Character resource families that can be synced from upstream and cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Assets,
    IndustryJobs,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Assets, ResourceKind::IndustryJobs];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::IndustryJobs => "industry_jobs",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownResourceKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "assets" => Ok(Self::Assets),
            "industry_jobs" | "industry-jobs" | "industry" => Ok(Self::IndustryJobs),
            other => Err(UnknownResourceKind(other.to_owned())),
        }
    }
}

/// One asset row as validated from upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub item_id: ItemId,
    pub type_id: TypeId,
    pub quantity: i64,
    pub location_id: LocationId,
}

/// One industry job row as validated from upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryJobEntry {
    pub job_id: IndustryJobId,
    pub type_id: TypeId,
    pub status: String,
    pub output_location_id: LocationId,
}

impl IndustryJobEntry {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Complete result set for one `(character, resource kind)` sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceRows {
    Assets(Vec<AssetEntry>),
    IndustryJobs(Vec<IndustryJobEntry>),
}

impl ResourceRows {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Assets(_) => ResourceKind::Assets,
            Self::IndustryJobs(_) => ResourceKind::IndustryJobs,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Assets(rows) => rows.len(),
            Self::IndustryJobs(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Asset row as served to readers, stamped with its snapshot's `synced_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub item_id: ItemId,
    pub type_id: TypeId,
    pub type_name: Option<String>,
    pub quantity: i64,
    pub location_id: LocationId,
    pub synced_at: Timestamp,
}

impl AssetRecord {
    pub fn from_entry(entry: AssetEntry, synced_at: Timestamp, type_name: Option<String>) -> Self {
        Self {
            item_id: entry.item_id,
            type_id: entry.type_id,
            type_name,
            quantity: entry.quantity,
            location_id: entry.location_id,
            synced_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndustryJobRecord {
    pub job_id: IndustryJobId,
    pub type_id: TypeId,
    pub type_name: Option<String>,
    pub status: String,
    pub output_location_id: LocationId,
    pub synced_at: Timestamp,
}

impl IndustryJobRecord {
    pub fn from_entry(
        entry: IndustryJobEntry,
        synced_at: Timestamp,
        type_name: Option<String>,
    ) -> Self {
        Self {
            job_id: entry.job_id,
            type_id: entry.type_id,
            type_name,
            status: entry.status,
            output_location_id: entry.output_location_id,
            synced_at,
        }
    }
}

/// A cached result set plus the single freshness stamp covering all of it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSnapshot<T> {
    pub records: Vec<T>,
    pub total_records: u64,
    pub synced_at: Timestamp,
}

impl<T> ResourceSnapshot<T> {
    pub fn map_records<U>(self, f: impl FnMut(T) -> U) -> ResourceSnapshot<U> {
        ResourceSnapshot {
            records: self.records.into_iter().map(f).collect(),
            total_records: self.total_records,
            synced_at: self.synced_at,
        }
    }
}

/// Row count and freshness of one cached snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub resource_kind: ResourceKind,
    pub record_count: u64,
    pub synced_at: Timestamp,
}
