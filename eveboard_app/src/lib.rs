mod app;
mod config;
mod dashboard;
mod error;
mod queue;
mod retry;
mod worker;

pub use app::{AppRuntime, CachedRecords, SharedTokenManager, load_sde_index};
pub use config::SyncConfig;
pub use dashboard::{DashboardAggregator, DashboardOverview, MiningSummary};
pub use error::AppError;
pub use queue::SyncJobQueue;
pub use retry::RetryPolicy;
pub use worker::SyncWorkerPool;
