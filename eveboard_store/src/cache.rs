use eveboard_core::{
    ids::{CharacterId, IndustryJobId, ItemId, LocationId, TypeId},
    records::{
        AssetEntry, AssetRecord, IndustryJobEntry, IndustryJobRecord, ResourceKind, ResourceRows,
        ResourceSnapshot, SnapshotSummary,
    },
    time::Timestamp,
};
use futures_util::TryStreamExt;
use log::debug;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::{
    StoreError,
    db::{character_id_to_sqlite, invalid_column, timestamp_from_sqlite},
};

/// Window over a cached result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    pub const ALL: Self = Self {
        limit: None,
        offset: 0,
    };

    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    fn sqlite_limit(self) -> i64 {
        self.limit.map_or(-1, i64::from)
    }
}

/// Last successful sync per `(character, resource kind)`. A write replaces the
/// whole result set and its `synced_at` in one transaction, so readers see
/// either the previous snapshot or the new one.
#[derive(Clone, Debug)]
pub struct ResourceCache {
    pool: SqlitePool,
}

impl ResourceCache {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn write(
        &self,
        character_id: CharacterId,
        rows: &ResourceRows,
    ) -> Result<Timestamp, StoreError> {
        self.write_at(character_id, rows, Timestamp::now()).await
    }

    /// Returns the stamp actually stored, which is bumped past the previous
    /// snapshot's when the clock has not advanced.
    pub async fn write_at(
        &self,
        character_id: CharacterId,
        rows: &ResourceRows,
        synced_at: Timestamp,
    ) -> Result<Timestamp, StoreError> {
        let character = character_id_to_sqlite(character_id)?;
        let kind = rows.kind();
        let mut tx = self.pool.begin().await?;

        match rows {
            ResourceRows::Assets(entries) => {
                replace_assets(&mut tx, character, entries).await?;
            }
            ResourceRows::IndustryJobs(entries) => {
                replace_industry_jobs(&mut tx, character, entries).await?;
            }
        }

        let record_count =
            i64::try_from(rows.len()).map_err(|_| invalid_column("record_count", rows.len()))?;
        let stamped: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO resource_snapshots (
                character_id,
                resource_kind,
                synced_at_epoch_millis,
                record_count
            )
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (character_id, resource_kind) DO UPDATE SET
                synced_at_epoch_millis = MAX(
                    excluded.synced_at_epoch_millis,
                    resource_snapshots.synced_at_epoch_millis + 1
                ),
                record_count = excluded.record_count
            RETURNING synced_at_epoch_millis
            "#,
        )
        .bind(character)
        .bind(kind.as_str())
        .bind(synced_at.as_epoch_millis())
        .bind(record_count)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            "cached {} {kind} row(s) for character {character_id}",
            rows.len()
        );
        timestamp_from_sqlite(stamped)
    }

    pub async fn read_assets(
        &self,
        character_id: CharacterId,
        page: Page,
    ) -> Result<Option<ResourceSnapshot<AssetRecord>>, StoreError> {
        let character = character_id_to_sqlite(character_id)?;
        let mut tx = self.pool.begin().await?;

        let Some(snapshot) = load_snapshot(&mut tx, character, ResourceKind::Assets).await? else {
            tx.commit().await?;
            return Ok(None);
        };

        let rows: Vec<DbAssetRow> = sqlx::query_as(
            r#"
            SELECT item_id, type_id, quantity, location_id
            FROM asset_records
            WHERE character_id = ?1
            ORDER BY item_id ASC, row_index ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(character)
        .bind(page.sqlite_limit())
        .bind(i64::from(page.offset))
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let synced_at = timestamp_from_sqlite(snapshot.synced_at_epoch_millis)?;
        Ok(Some(ResourceSnapshot {
            records: rows
                .into_iter()
                .map(|row| AssetRecord::from_entry(row.into(), synced_at, None))
                .collect(),
            total_records: snapshot.record_count()?,
            synced_at,
        }))
    }

    pub async fn read_industry_jobs(
        &self,
        character_id: CharacterId,
        page: Page,
    ) -> Result<Option<ResourceSnapshot<IndustryJobRecord>>, StoreError> {
        let character = character_id_to_sqlite(character_id)?;
        let mut tx = self.pool.begin().await?;

        let Some(snapshot) = load_snapshot(&mut tx, character, ResourceKind::IndustryJobs).await?
        else {
            tx.commit().await?;
            return Ok(None);
        };

        let rows: Vec<DbIndustryJobRow> = sqlx::query_as(
            r#"
            SELECT job_id, type_id, status, output_location_id
            FROM industry_job_records
            WHERE character_id = ?1
            ORDER BY job_id ASC, row_index ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(character)
        .bind(page.sqlite_limit())
        .bind(i64::from(page.offset))
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let synced_at = timestamp_from_sqlite(snapshot.synced_at_epoch_millis)?;
        Ok(Some(ResourceSnapshot {
            records: rows
                .into_iter()
                .map(|row| IndustryJobRecord::from_entry(row.into(), synced_at, None))
                .collect(),
            total_records: snapshot.record_count()?,
            synced_at,
        }))
    }

    pub async fn snapshot_summary(
        &self,
        character_id: CharacterId,
        kind: ResourceKind,
    ) -> Result<Option<SnapshotSummary>, StoreError> {
        let character = character_id_to_sqlite(character_id)?;
        let mut conn = self.pool.acquire().await?;
        load_snapshot(&mut conn, character, kind)
            .await?
            .map(SnapshotSummary::try_from)
            .transpose()
    }

    pub async fn summaries(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<SnapshotSummary>, StoreError> {
        let character = character_id_to_sqlite(character_id)?;
        let mut rows = sqlx::query_as::<_, DbSnapshotRow>(
            r#"
            SELECT resource_kind, synced_at_epoch_millis, record_count
            FROM resource_snapshots
            WHERE character_id = ?1
            ORDER BY resource_kind ASC
            "#,
        )
        .bind(character)
        .fetch(&self.pool);

        let mut summaries = Vec::new();
        while let Some(row) = rows.try_next().await? {
            summaries.push(SnapshotSummary::try_from(row)?);
        }
        Ok(summaries)
    }
}

async fn replace_assets(
    conn: &mut SqliteConnection,
    character: i64,
    entries: &[AssetEntry],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM asset_records WHERE character_id = ?1")
        .bind(character)
        .execute(&mut *conn)
        .await?;

    for (row_index, entry) in entries.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO asset_records (
                character_id, row_index, item_id, type_id, quantity, location_id
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(character)
        .bind(row_index_to_sqlite(row_index)?)
        .bind(entry.item_id.0)
        .bind(entry.type_id.0)
        .bind(entry.quantity)
        .bind(entry.location_id.0)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_industry_jobs(
    conn: &mut SqliteConnection,
    character: i64,
    entries: &[IndustryJobEntry],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM industry_job_records WHERE character_id = ?1")
        .bind(character)
        .execute(&mut *conn)
        .await?;

    for (row_index, entry) in entries.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO industry_job_records (
                character_id, row_index, job_id, type_id, status, output_location_id
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(character)
        .bind(row_index_to_sqlite(row_index)?)
        .bind(entry.job_id.0)
        .bind(entry.type_id.0)
        .bind(&entry.status)
        .bind(entry.output_location_id.0)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_snapshot(
    conn: &mut SqliteConnection,
    character: i64,
    kind: ResourceKind,
) -> Result<Option<DbSnapshotRow>, StoreError> {
    Ok(sqlx::query_as(
        r#"
        SELECT resource_kind, synced_at_epoch_millis, record_count
        FROM resource_snapshots
        WHERE character_id = ?1 AND resource_kind = ?2
        "#,
    )
    .bind(character)
    .bind(kind.as_str())
    .fetch_optional(&mut *conn)
    .await?)
}

fn row_index_to_sqlite(row_index: usize) -> Result<i64, StoreError> {
    i64::try_from(row_index).map_err(|_| invalid_column("row_index", row_index))
}

#[derive(Debug, FromRow)]
struct DbSnapshotRow {
    resource_kind: String,
    synced_at_epoch_millis: i64,
    record_count: i64,
}

impl DbSnapshotRow {
    fn record_count(&self) -> Result<u64, StoreError> {
        u64::try_from(self.record_count)
            .map_err(|_| invalid_column("record_count", self.record_count))
    }
}

impl TryFrom<DbSnapshotRow> for SnapshotSummary {
    type Error = StoreError;

    fn try_from(value: DbSnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            resource_kind: value
                .resource_kind
                .parse()
                .map_err(|_| invalid_column("resource_kind", &value.resource_kind))?,
            record_count: value.record_count()?,
            synced_at: timestamp_from_sqlite(value.synced_at_epoch_millis)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct DbAssetRow {
    item_id: i64,
    type_id: i32,
    quantity: i64,
    location_id: i64,
}

impl From<DbAssetRow> for AssetEntry {
    fn from(value: DbAssetRow) -> Self {
        Self {
            item_id: ItemId(value.item_id),
            type_id: TypeId(value.type_id),
            quantity: value.quantity,
            location_id: LocationId(value.location_id),
        }
    }
}

#[derive(Debug, FromRow)]
struct DbIndustryJobRow {
    job_id: i32,
    type_id: i32,
    status: String,
    output_location_id: i64,
}

impl From<DbIndustryJobRow> for IndustryJobEntry {
    fn from(value: DbIndustryJobRow) -> Self {
        Self {
            job_id: IndustryJobId(value.job_id),
            type_id: TypeId(value.type_id),
            status: value.status,
            output_location_id: LocationId(value.output_location_id),
        }
    }
}
