use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use eveboard_core::{
    ids::{CharacterId, SyncJobId},
    jobs::{SyncJob, SyncJobKey, SyncJobStatus},
    records::ResourceKind,
    time::Timestamp,
};
use eveboard_esi::{Clock, EsiError, SystemClock, TokenStore};
use eveboard_store::SyncJobHistory;
use log::{debug, error, info};
use tokio::sync::{Notify, broadcast, watch};

use crate::AppError;

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct QueueState {
    jobs: HashMap<SyncJobId, SyncJob>,
    active: HashMap<SyncJobKey, SyncJobId>,
    ready: Vec<SyncJobId>,
}

enum NextJob {
    Started(SyncJob),
    WaitUntil(Timestamp),
    Idle,
}

/// Admits sync jobs and tracks them until they reach a terminal state.
///
/// At most one non-terminal job exists per `(character, resource kind)`;
/// admission is decided under the table lock. Terminal jobs move to the
/// persistent history and are looked up there afterwards.
pub struct SyncJobQueue {
    state: Mutex<QueueState>,
    wakeup: Notify,
    events: broadcast::Sender<SyncJob>,
    tokens: Arc<dyn TokenStore>,
    history: SyncJobHistory,
    clock: Arc<dyn Clock>,
}

impl SyncJobQueue {
    pub fn new(tokens: Arc<dyn TokenStore>, history: SyncJobHistory) -> Self {
        Self::with_clock(tokens, history, Arc::new(SystemClock))
    }

    pub fn with_clock(
        tokens: Arc<dyn TokenStore>,
        history: SyncJobHistory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(QueueState::default()),
            wakeup: Notify::new(),
            events,
            tokens,
            history,
            clock,
        }
    }

    /// Every status change, in the order it was applied.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncJob> {
        self.events.subscribe()
    }

    /// Returns the existing non-terminal job for the key when there is one.
    pub async fn enqueue(
        &self,
        character_id: CharacterId,
        resource_kind: ResourceKind,
    ) -> Result<SyncJob, AppError> {
        if self.tokens.load_token(character_id).await?.is_none() {
            return Err(EsiError::TokenNotFound(character_id).into());
        }

        let key = SyncJobKey {
            character_id,
            resource_kind,
        };
        let now = self.clock.now();

        let job = {
            let mut state = self.lock_state();
            let existing = state
                .active
                .get(&key)
                .and_then(|job_id| state.jobs.get(job_id))
                .cloned();
            if let Some(existing) = existing {
                debug!(
                    "sync job {} already in flight for {key}",
                    existing.job_id
                );
                return Ok(existing);
            }

            let job = SyncJob::queued(character_id, resource_kind, now);
            state.active.insert(key, job.job_id);
            state.ready.push(job.job_id);
            state.jobs.insert(job.job_id, job.clone());
            let _ = self.events.send(job.clone());
            job
        };

        info!("admitted sync job {} for {key}", job.job_id);
        self.wakeup.notify_waiters();
        Ok(job)
    }

    pub async fn job_status(&self, job_id: SyncJobId) -> Result<SyncJob, AppError> {
        let cached = self.lock_state().jobs.get(&job_id).cloned();
        if let Some(job) = cached {
            return Ok(job);
        }

        self.history
            .load(job_id)
            .await?
            .ok_or(AppError::JobNotFound(job_id))
    }

    pub fn in_flight(&self, character_id: CharacterId) -> Vec<SyncJob> {
        let state = self.lock_state();
        let mut jobs = state
            .active
            .iter()
            .filter(|(key, _)| key.character_id == character_id)
            .filter_map(|(_, job_id)| state.jobs.get(job_id).cloned())
            .collect::<Vec<_>>();
        jobs.sort_by_key(|job| (job.enqueued_at, job.job_id));
        jobs
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock_state().active.len()
    }

    /// Waits for the next runnable job and marks it `Running`. Returns `None`
    /// once shutdown is signalled.
    pub async fn next_job(&self, shutdown_rx: &mut watch::Receiver<bool>) -> Option<SyncJob> {
        loop {
            if *shutdown_rx.borrow() {
                return None;
            }

            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = match self.try_start_next() {
                NextJob::Started(job) => return Some(job),
                NextJob::WaitUntil(at) => Some(at.saturating_duration_since(self.clock.now())),
                NextJob::Idle => None,
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_or_park(wait) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        return None;
                    }
                }
            }
        }
    }

    /// Puts a running job back in line until `delay` has passed.
    pub fn retry_later(
        &self,
        job_id: SyncJobId,
        delay: Duration,
        reason: String,
    ) -> Result<SyncJob, AppError> {
        let now = self.clock.now();
        let next_attempt_at = now.checked_add(delay).unwrap_or(now);
        let job = {
            let mut state = self.lock_state();
            let job = self.transition(&mut state, job_id, SyncJobStatus::Queued, |job| {
                job.error = Some(reason);
                job.next_attempt_at = Some(next_attempt_at);
            })?;
            state.ready.push(job_id);
            job
        };
        self.wakeup.notify_waiters();
        Ok(job)
    }

    pub async fn succeed(&self, job_id: SyncJobId) -> Result<SyncJob, AppError> {
        self.finish(job_id, SyncJobStatus::Succeeded, None).await
    }

    pub async fn fail(&self, job_id: SyncJobId, reason: String) -> Result<SyncJob, AppError> {
        self.finish(job_id, SyncJobStatus::Failed, Some(reason)).await
    }

    pub async fn prune_history(&self, retention: Duration) -> Result<u64, AppError> {
        let now = self.clock.now();
        let cutoff = now.checked_sub(retention).unwrap_or(now);
        Ok(self.history.prune_completed_before(cutoff).await?)
    }

    fn try_start_next(&self) -> NextJob {
        let now = self.clock.now();
        let mut state = self.lock_state();

        let mut earliest_wait: Option<Timestamp> = None;
        let mut candidate: Option<&SyncJob> = None;
        for job in state.ready.iter().filter_map(|job_id| state.jobs.get(job_id)) {
            match job.next_attempt_at {
                Some(at) if at > now => {
                    earliest_wait = Some(earliest_wait.map_or(at, |current| current.min(at)));
                }
                _ => {
                    let better = candidate.is_none_or(|current| {
                        (job.enqueued_at, job.job_id) < (current.enqueued_at, current.job_id)
                    });
                    if better {
                        candidate = Some(job);
                    }
                }
            }
        }

        let Some(job_id) = candidate.map(|job| job.job_id) else {
            return earliest_wait.map_or(NextJob::Idle, NextJob::WaitUntil);
        };

        state.ready.retain(|ready_id| *ready_id != job_id);
        match self.transition(&mut state, job_id, SyncJobStatus::Running, |job| {
            job.started_at = Some(now);
            job.attempts += 1;
            job.next_attempt_at = None;
        }) {
            Ok(job) => {
                debug!(
                    "sync job {job_id} running (attempt {}) for {}",
                    job.attempts,
                    job.key()
                );
                NextJob::Started(job)
            }
            Err(err) => {
                error!("dropping unstartable sync job {job_id}: {err}");
                NextJob::Idle
            }
        }
    }

    async fn finish(
        &self,
        job_id: SyncJobId,
        status: SyncJobStatus,
        error: Option<String>,
    ) -> Result<SyncJob, AppError> {
        let now = self.clock.now();
        let job = {
            let mut state = self.lock_state();
            let job = self.transition(&mut state, job_id, status, |job| {
                job.completed_at = Some(now);
                job.next_attempt_at = None;
                job.error = error;
            })?;
            state.active.remove(&job.key());
            job
        };

        match self.history.archive(&job).await {
            Ok(()) => {
                self.lock_state().jobs.remove(&job_id);
            }
            Err(err) => {
                error!("failed to archive sync job {job_id}, keeping it in memory: {err}");
            }
        }
        Ok(job)
    }

    fn transition(
        &self,
        state: &mut QueueState,
        job_id: SyncJobId,
        next: SyncJobStatus,
        update: impl FnOnce(&mut SyncJob),
    ) -> Result<SyncJob, AppError> {
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or(AppError::JobNotFound(job_id))?;
        if !job.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                job_id,
                from: job.status,
                to: next,
            });
        }

        job.status = next;
        update(job);
        let snapshot = job.clone();
        let _ = self.events.send(snapshot.clone());
        Ok(snapshot)
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn sleep_or_park(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}
