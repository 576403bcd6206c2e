use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct SyncConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub jitter_factor: f32,
    pub fetch_timeout: Duration,
    pub history_retention: Duration,
    pub history_prune_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 5,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            jitter_factor: 0.2,
            fetch_timeout: Duration::from_secs(30),
            history_retention: Duration::from_secs(24 * 60 * 60),
            history_prune_interval: Duration::from_secs(10 * 60),
        }
    }
}
