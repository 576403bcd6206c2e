use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterId(pub u64);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub i32);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub i32);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub i32);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketGroupId(pub i32);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub i64);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub i64);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndustryJobId(pub i32);

/// Identifier of a background sync job. Time-ordered (UUIDv7) so ids sort by admission.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncJobId(pub Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for SyncJobId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

macro_rules! display_inner {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

display_inner!(
    CharacterId,
    TypeId,
    GroupId,
    CategoryId,
    MarketGroupId,
    ItemId,
    LocationId,
    IndustryJobId,
    SyncJobId,
);

#[cfg(test)]
mod tests {
    use super::{CharacterId, SyncJobId};

    #[test]
    fn ids_serialize_as_bare_values() {
        let raw = serde_json::to_string(&CharacterId(1001)).expect("serialize id");
        assert_eq!(raw, "1001");
    }

    #[test]
    fn sync_job_ids_round_trip_through_text() {
        let id = SyncJobId::new();
        let parsed: SyncJobId = id.to_string().parse().expect("parse job id");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SyncJobId>().is_err());
    }
}
