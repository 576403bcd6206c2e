use eveboard_core::{
    ids::SyncJobId,
    jobs::{SyncJob, SyncJobStatus},
    time::Timestamp,
};
use futures_util::TryStreamExt;
use log::debug;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    StoreError,
    db::{character_id_from_sqlite, character_id_to_sqlite, invalid_column, timestamp_from_sqlite},
};

/// Archive of sync jobs that reached a terminal state.
#[derive(Clone, Debug)]
pub struct SyncJobHistory {
    pool: SqlitePool,
}

impl SyncJobHistory {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn archive(&self, job: &SyncJob) -> Result<(), StoreError> {
        let completed_at = job
            .completed_at
            .ok_or_else(|| invalid_column("completed_at", "null"))?;
        if !job.status.is_terminal() {
            return Err(invalid_column("status", job.status));
        }

        sqlx::query(
            r#"
            INSERT INTO sync_job_history (
                job_id,
                character_id,
                resource_kind,
                status,
                enqueued_at_epoch_millis,
                started_at_epoch_millis,
                completed_at_epoch_millis,
                error,
                attempts
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (job_id) DO NOTHING
            "#,
        )
        .bind(job.job_id.0.to_string())
        .bind(character_id_to_sqlite(job.character_id)?)
        .bind(job.resource_kind.as_str())
        .bind(job.status.as_str())
        .bind(job.enqueued_at.as_epoch_millis())
        .bind(job.started_at.map(Timestamp::as_epoch_millis))
        .bind(completed_at.as_epoch_millis())
        .bind(&job.error)
        .bind(i64::from(job.attempts))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load(&self, job_id: SyncJobId) -> Result<Option<SyncJob>, StoreError> {
        let row: Option<DbSyncJobRow> = sqlx::query_as(
            r#"
            SELECT
                job_id,
                character_id,
                resource_kind,
                status,
                enqueued_at_epoch_millis,
                started_at_epoch_millis,
                completed_at_epoch_millis,
                error,
                attempts
            FROM sync_job_history
            WHERE job_id = ?1
            "#,
        )
        .bind(job_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncJob::try_from).transpose()
    }

    /// Most recently completed first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<SyncJob>, StoreError> {
        let mut rows = sqlx::query_as::<_, DbSyncJobRow>(
            r#"
            SELECT
                job_id,
                character_id,
                resource_kind,
                status,
                enqueued_at_epoch_millis,
                started_at_epoch_millis,
                completed_at_epoch_millis,
                error,
                attempts
            FROM sync_job_history
            ORDER BY completed_at_epoch_millis DESC, job_id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch(&self.pool);

        let mut jobs = Vec::new();
        while let Some(row) = rows.try_next().await? {
            jobs.push(SyncJob::try_from(row)?);
        }
        Ok(jobs)
    }

    pub async fn prune_completed_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM sync_job_history WHERE completed_at_epoch_millis < ?1")
                .bind(cutoff.as_epoch_millis())
                .execute(&self.pool)
                .await?;
        let pruned = result.rows_affected();
        if pruned > 0 {
            debug!("pruned {pruned} sync job(s) completed before {cutoff}");
        }
        Ok(pruned)
    }
}

#[derive(Debug, FromRow)]
struct DbSyncJobRow {
    job_id: String,
    character_id: i64,
    resource_kind: String,
    status: String,
    enqueued_at_epoch_millis: i64,
    started_at_epoch_millis: Option<i64>,
    completed_at_epoch_millis: i64,
    error: Option<String>,
    attempts: i64,
}

impl TryFrom<DbSyncJobRow> for SyncJob {
    type Error = StoreError;

    fn try_from(value: DbSyncJobRow) -> Result<Self, Self::Error> {
        let status: SyncJobStatus = value
            .status
            .parse()
            .map_err(|_| invalid_column("status", &value.status))?;

        Ok(Self {
            job_id: SyncJobId(
                Uuid::parse_str(&value.job_id).map_err(|_| invalid_column("job_id", &value.job_id))?,
            ),
            character_id: character_id_from_sqlite(value.character_id)?,
            resource_kind: value
                .resource_kind
                .parse()
                .map_err(|_| invalid_column("resource_kind", &value.resource_kind))?,
            status,
            enqueued_at: timestamp_from_sqlite(value.enqueued_at_epoch_millis)?,
            started_at: value
                .started_at_epoch_millis
                .map(timestamp_from_sqlite)
                .transpose()?,
            completed_at: Some(timestamp_from_sqlite(value.completed_at_epoch_millis)?),
            error: value.error,
            attempts: u32::try_from(value.attempts)
                .map_err(|_| invalid_column("attempts", value.attempts))?,
            next_attempt_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use eveboard_core::{
        ids::{CharacterId, SyncJobId},
        jobs::{SyncJob, SyncJobStatus},
        records::ResourceKind,
        time::Timestamp,
    };
    use tempfile::tempdir;

    use crate::Database;

    fn ts_millis(epoch_millis: i64) -> Timestamp {
        Timestamp::from_epoch_millis(epoch_millis).expect("valid epoch millis")
    }

    fn finished(status: SyncJobStatus, completed_at: i64) -> SyncJob {
        let mut job = SyncJob::queued(CharacterId(1001), ResourceKind::Assets, ts_millis(1_000));
        job.status = status;
        job.started_at = Some(ts_millis(1_500));
        job.completed_at = Some(ts_millis(completed_at));
        job.attempts = 2;
        if status == SyncJobStatus::Failed {
            job.error = Some("rate limited".to_owned());
        }
        job
    }

    #[tokio::test]
    async fn archived_jobs_load_until_pruned() {
        let temp_dir = tempdir().expect("tempdir");
        let history = Database::connect(temp_dir.path().join("jobs.sqlite"))
            .await
            .expect("connect store")
            .job_history();

        let old = finished(SyncJobStatus::Failed, 2_000);
        let fresh = finished(SyncJobStatus::Succeeded, 9_000);
        history.archive(&old).await.expect("archive old");
        history.archive(&fresh).await.expect("archive fresh");

        assert_eq!(
            history.load(old.job_id).await.expect("load"),
            Some(old.clone())
        );
        assert_eq!(history.recent(10).await.expect("recent")[0], fresh);

        let pruned = history
            .prune_completed_before(ts_millis(5_000))
            .await
            .expect("prune");
        assert_eq!(pruned, 1);
        assert!(history.load(old.job_id).await.expect("load").is_none());
        assert!(history.load(SyncJobId::new()).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn non_terminal_jobs_are_not_archived() {
        let temp_dir = tempdir().expect("tempdir");
        let history = Database::connect(temp_dir.path().join("jobs.sqlite"))
            .await
            .expect("connect store")
            .job_history();

        let mut running = finished(SyncJobStatus::Running, 2_000);
        assert!(history.archive(&running).await.is_err());
        running.completed_at = None;
        assert!(history.archive(&running).await.is_err());
    }
}
