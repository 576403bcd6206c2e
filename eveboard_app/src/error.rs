use eveboard_core::{
    ids::SyncJobId,
    jobs::SyncJobStatus,
    sde::SdeError,
};
use eveboard_esi::EsiError;
use eveboard_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("esi error: {0}")]
    Esi(#[from] EsiError),

    #[error("sde error: {0}")]
    Sde(#[from] SdeError),

    #[error("sync job {0} not found")]
    JobNotFound(SyncJobId),

    #[error("sync job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: SyncJobId,
        from: SyncJobStatus,
        to: SyncJobStatus,
    },

    #[error("failed to read sde file {path}: {source}")]
    SdeFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn esi(&self) -> Option<&EsiError> {
        match self {
            Self::Esi(err) => Some(err),
            _ => None,
        }
    }
}
