use std::sync::Arc;

use eveboard_core::{jobs::SyncJob, time::Timestamp};
use eveboard_esi::{EsiApiClient, EsiError};
use eveboard_store::ResourceCache;
use log::{debug, error, info, warn};
use tokio::{sync::watch, task::JoinSet};

use crate::{AppError, SharedTokenManager, SyncConfig, SyncJobQueue, retry::RetryPolicy};

/// Fixed set of workers draining the queue. Upstream pacing comes from the
/// rate limiter inside the API client, so pool size never raises the call rate.
pub struct SyncWorkerPool {
    queue: Arc<SyncJobQueue>,
    tokens: SharedTokenManager,
    api: Arc<dyn EsiApiClient>,
    cache: ResourceCache,
    config: SyncConfig,
}

impl SyncWorkerPool {
    pub fn new(
        queue: Arc<SyncJobQueue>,
        tokens: SharedTokenManager,
        api: Arc<dyn EsiApiClient>,
        cache: ResourceCache,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue,
            tokens,
            api,
            cache,
            config,
        }
    }

    /// Starts the workers plus the history pruner.
    pub fn spawn(self: &Arc<Self>, shutdown_rx: watch::Receiver<bool>) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for worker_index in 0..self.config.workers.max(1) {
            let pool = Arc::clone(self);
            let shutdown_rx = shutdown_rx.clone();
            tasks.spawn(async move { pool.run_worker(worker_index, shutdown_rx).await });
        }

        let pool = Arc::clone(self);
        tasks.spawn(async move { pool.prune_history_until_shutdown(shutdown_rx).await });
        tasks
    }

    /// Runs until shutdown is signalled and every in-progress job has settled.
    pub async fn run_until_shutdown(self: &Arc<Self>, shutdown_rx: watch::Receiver<bool>) {
        let mut tasks = self.spawn(shutdown_rx);
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!("sync worker task ended abnormally: {err}");
            }
        }
        debug!("sync worker pool stopped");
    }

    async fn run_worker(&self, worker_index: usize, mut shutdown_rx: watch::Receiver<bool>) {
        let mut retry = RetryPolicy::new(&self.config, worker_index as u64);
        debug!("sync worker {worker_index} starting");

        while let Some(job) = self.queue.next_job(&mut shutdown_rx).await {
            let result = self.execute(&job).await;
            self.settle(&job, result, &mut retry).await;
        }

        debug!("sync worker {worker_index} stopping");
    }

    async fn execute(&self, job: &SyncJob) -> Result<Timestamp, AppError> {
        let access = self.tokens.acquire_usable(job.character_id).await?;
        let fetch = self
            .api
            .fetch_resource(job.resource_kind, job.character_id, &access.access_token);

        let rows = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(rows) => rows?,
            Err(_) => {
                return Err(EsiError::UpstreamUnavailable {
                    reason: format!(
                        "upstream call timed out after {:?}",
                        self.config.fetch_timeout
                    ),
                }
                .into());
            }
        };

        Ok(self.cache.write(job.character_id, &rows).await?)
    }

    async fn settle(
        &self,
        job: &SyncJob,
        result: Result<Timestamp, AppError>,
        retry: &mut RetryPolicy,
    ) {
        let settled = match result {
            Ok(synced_at) => {
                info!(
                    "sync job {} succeeded for {}, synced at {synced_at}",
                    job.job_id,
                    job.key()
                );
                self.queue.succeed(job.job_id).await
            }
            Err(err) => {
                let reason = failure_reason(&err);
                let retryable = err.esi().is_some_and(EsiError::is_retryable);

                if retryable && !retry.attempts_exhausted(job.attempts) {
                    let retry_after = err.esi().and_then(EsiError::retry_after);
                    let delay = retry.delay_for(job.attempts, retry_after);
                    warn!(
                        "sync job {} attempt {} failed, retrying in {delay:?}: {reason}",
                        job.job_id, job.attempts
                    );
                    self.queue.retry_later(job.job_id, delay, reason)
                } else {
                    let reason = if retryable {
                        format!("gave up after {} attempts: {reason}", job.attempts)
                    } else {
                        reason
                    };
                    error!("sync job {} failed for {}: {reason}", job.job_id, job.key());
                    self.queue.fail(job.job_id, reason).await
                }
            }
        };

        if let Err(err) = settled {
            error!("could not record outcome of sync job {}: {err}", job.job_id);
        }
    }

    async fn prune_history_until_shutdown(&self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                return;
            }

            match self.queue.prune_history(self.config.history_retention).await {
                Ok(0) => {}
                Ok(pruned) => debug!("pruned {pruned} archived sync job(s)"),
                Err(err) => warn!("sync job history prune failed: {err}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.history_prune_interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

fn failure_reason(err: &AppError) -> String {
    match err {
        AppError::Esi(err) => err.display_chain().to_string(),
        other => other.to_string(),
    }
}
