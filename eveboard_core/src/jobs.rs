use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    ids::{CharacterId, SyncJobId},
    records::ResourceKind,
    time::Timestamp,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl SyncJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Legal moves: `Queued -> Running`, `Running -> Queued` (retry), `Running -> Succeeded | Failed`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Running, Self::Queued)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sync job status '{0}'")]
pub struct UnknownSyncJobStatus(pub String);

impl FromStr for SyncJobStatus {
    type Err = UnknownSyncJobStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownSyncJobStatus(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: SyncJobId,
    pub character_id: CharacterId,
    #[serde(rename = "resource_type")]
    pub resource_kind: ResourceKind,
    pub status: SyncJobStatus,
    pub enqueued_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error: Option<String>,
    pub attempts: u32,
    pub next_attempt_at: Option<Timestamp>,
}

impl SyncJob {
    pub fn queued(character_id: CharacterId, resource_kind: ResourceKind, now: Timestamp) -> Self {
        Self {
            job_id: SyncJobId::new(),
            character_id,
            resource_kind,
            status: SyncJobStatus::Queued,
            enqueued_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            attempts: 0,
            next_attempt_at: None,
        }
    }

    pub fn key(&self) -> SyncJobKey {
        SyncJobKey {
            character_id: self.character_id,
            resource_kind: self.resource_kind,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Admission key: at most one non-terminal job exists per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncJobKey {
    pub character_id: CharacterId,
    pub resource_kind: ResourceKind,
}

impl fmt::Display for SyncJobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.character_id, self.resource_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::SyncJobStatus::{self, *};

    #[test]
    fn terminal_states_accept_no_transitions() {
        for next in [Queued, Running, Succeeded, Failed] {
            assert!(!Succeeded.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn queued_jobs_must_run_before_finishing() {
        assert!(Queued.can_transition_to(Running));
        assert!(!Queued.can_transition_to(Succeeded));
        assert!(!Queued.can_transition_to(Failed));
        assert!(Running.can_transition_to(Queued));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
    }

    #[test]
    fn status_text_round_trips() {
        for status in [Queued, Running, Succeeded, Failed] {
            assert_eq!(status.as_str().parse::<SyncJobStatus>(), Ok(status));
        }
    }
}
