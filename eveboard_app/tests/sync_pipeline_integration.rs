mod support;

use std::time::Duration;

use eveboard_app::{AppError, SyncConfig, load_sde_index};
use eveboard_core::{
    ids::{CharacterId, TypeId},
    jobs::SyncJobStatus,
    records::ResourceKind,
};
use eveboard_esi::EsiError;
use eveboard_store::Page;
use support::{
    CHARACTER, FakeEsi, TestHarness, fast_sync_config, rate_limited, token_rejected, two_assets,
    unavailable, wait_for_terminal,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn asset_sync_lands_in_cache_with_type_names() {
    let mut harness = TestHarness::new(FakeEsi::new(two_assets)).await;
    harness.store_token(3_600).await;
    let mut events = harness.subscribe();
    harness.start_workers();

    let job = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::Assets)
        .await
        .expect("enqueue");
    assert_eq!(job.status, SyncJobStatus::Queued);

    let seen = wait_for_terminal(&mut events, job.job_id).await;
    let statuses: Vec<_> = seen.iter().map(|event| event.status).collect();
    assert_eq!(
        statuses,
        vec![
            SyncJobStatus::Queued,
            SyncJobStatus::Running,
            SyncJobStatus::Succeeded
        ]
    );

    let cached = harness
        .runtime
        .assets(CHARACTER, Page::ALL)
        .await
        .expect("read assets");
    assert_eq!(cached.total_records, 2);
    assert_eq!(cached.records.len(), 2);
    assert_eq!(cached.records[0].type_name.as_deref(), Some("Tritanium"));
    assert_eq!(cached.records[1].type_name.as_deref(), Some("Pyerite"));
    let synced_at = cached.synced_at.expect("synced");
    assert!(synced_at > job.enqueued_at);

    let status = harness
        .runtime
        .job_status(job.job_id)
        .await
        .expect("status from history");
    assert_eq!(status.status, SyncJobStatus::Succeeded);
    assert_eq!(status.attempts, 1);
    assert!(status.completed_at.is_some());

    harness.stop_workers().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enqueues_for_same_resource_share_one_job() {
    let harness = TestHarness::new(FakeEsi::new(two_assets)).await;
    harness.store_token(3_600).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let runtime = harness.runtime.clone();
        handles.push(tokio::spawn(async move {
            runtime
                .enqueue_sync(CHARACTER, ResourceKind::Assets)
                .await
                .expect("enqueue")
                .job_id
        }));
    }

    let mut job_ids = Vec::new();
    for handle in handles {
        job_ids.push(handle.await.expect("task"));
    }
    job_ids.dedup();
    assert_eq!(job_ids.len(), 1);
    assert_eq!(harness.runtime.queue().in_flight_count(), 1);

    let other_kind = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::IndustryJobs)
        .await
        .expect("enqueue industry jobs");
    assert_ne!(other_kind.job_id, job_ids[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn enqueue_without_token_is_rejected() {
    let harness = TestHarness::new(FakeEsi::new(two_assets)).await;

    let err = harness
        .runtime
        .enqueue_sync(CharacterId(4242), ResourceKind::Assets)
        .await
        .expect_err("no token stored");
    assert!(matches!(
        err,
        AppError::Esi(EsiError::TokenNotFound(CharacterId(4242)))
    ));
    assert_eq!(harness.runtime.queue().in_flight_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn persistent_rate_limiting_fails_after_max_attempts() {
    let mut harness = TestHarness::new(FakeEsi::new(rate_limited)).await;
    harness.store_token(3_600).await;
    let mut events = harness.subscribe();
    harness.start_workers();

    let job = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::Assets)
        .await
        .expect("enqueue");
    let seen = wait_for_terminal(&mut events, job.job_id).await;
    let last = seen.last().expect("terminal event");

    assert_eq!(last.status, SyncJobStatus::Failed);
    assert_eq!(last.attempts, 3);
    assert!(
        last.error
            .as_deref()
            .is_some_and(|reason| reason.contains("gave up after 3 attempts"))
    );
    assert_eq!(harness.esi.asset_calls(), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.esi.asset_calls(), 3);
    assert!(harness.runtime.cache().read_assets(CHARACTER, Page::ALL).await.expect("read").is_none());

    harness.stop_workers().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stalled_fetch_times_out_and_is_retried_until_exhausted() {
    let config = SyncConfig {
        max_attempts: 2,
        fetch_timeout: Duration::from_millis(50),
        ..fast_sync_config()
    };
    let esi = FakeEsi::new(two_assets).with_delay(Duration::from_millis(500));
    let mut harness = TestHarness::with_config(esi, config).await;
    harness.store_token(3_600).await;
    let mut events = harness.subscribe();
    harness.start_workers();

    let job = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::Assets)
        .await
        .expect("enqueue");
    let seen = wait_for_terminal(&mut events, job.job_id).await;
    let last = seen.last().expect("terminal event");

    let running = seen
        .iter()
        .filter(|event| event.status == SyncJobStatus::Running)
        .count();
    assert_eq!(running, 2);
    assert_eq!(last.status, SyncJobStatus::Failed);
    assert_eq!(last.attempts, 2);
    let reason = last.error.as_deref().expect("failure reason");
    assert!(reason.contains("gave up after 2 attempts"), "reason: {reason}");
    assert!(reason.contains("timed out"), "reason: {reason}");
    assert_eq!(harness.esi.asset_calls(), 2);
    assert!(harness.runtime.cache().read_assets(CHARACTER, Page::ALL).await.expect("read").is_none());

    harness.stop_workers().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_token_fails_without_retry() {
    let mut harness = TestHarness::new(FakeEsi::new(token_rejected)).await;
    harness.store_token(3_600).await;
    let mut events = harness.subscribe();
    harness.start_workers();

    let job = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::Assets)
        .await
        .expect("enqueue");
    let seen = wait_for_terminal(&mut events, job.job_id).await;
    let last = seen.last().expect("terminal event");

    assert_eq!(last.status, SyncJobStatus::Failed);
    assert_eq!(last.attempts, 1);
    assert_eq!(harness.esi.asset_calls(), 1);

    harness.stop_workers().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transient_failure_is_retried_until_success() {
    let esi = FakeEsi::new(two_assets).with_script(vec![unavailable()]);
    let mut harness = TestHarness::new(esi).await;
    harness.store_token(3_600).await;
    let mut events = harness.subscribe();
    harness.start_workers();

    let job = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::Assets)
        .await
        .expect("enqueue");
    let seen = wait_for_terminal(&mut events, job.job_id).await;
    let statuses: Vec<_> = seen.iter().map(|event| event.status).collect();

    assert_eq!(
        statuses,
        vec![
            SyncJobStatus::Queued,
            SyncJobStatus::Running,
            SyncJobStatus::Queued,
            SyncJobStatus::Running,
            SyncJobStatus::Succeeded
        ]
    );
    assert_eq!(seen.last().expect("terminal").attempts, 2);
    assert_eq!(harness.esi.asset_calls(), 2);

    harness.stop_workers().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn expiring_token_is_refreshed_once_before_fetch() {
    let mut harness = TestHarness::new(FakeEsi::new(two_assets)).await;
    harness.store_token(10).await;
    let mut assets_events = harness.subscribe();
    let mut industry_events = harness.subscribe();
    harness.start_workers();

    let assets = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::Assets)
        .await
        .expect("enqueue assets");
    let industry = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::IndustryJobs)
        .await
        .expect("enqueue industry jobs");

    let assets_seen = wait_for_terminal(&mut assets_events, assets.job_id).await;
    let industry_seen = wait_for_terminal(&mut industry_events, industry.job_id).await;
    assert_eq!(
        assets_seen.last().expect("terminal").status,
        SyncJobStatus::Succeeded
    );
    assert_eq!(
        industry_seen.last().expect("terminal").status,
        SyncJobStatus::Succeeded
    );
    assert_eq!(
        harness
            .sso
            .refresh_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );

    let verification = harness
        .runtime
        .verify_token(CHARACTER)
        .await
        .expect("verify");
    assert!(verification.valid);

    harness.stop_workers().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overview_reflects_synced_assets() {
    let mut harness = TestHarness::new(FakeEsi::new(two_assets)).await;

    let empty = harness.runtime.overview().await.expect("overview");
    assert_eq!(empty.character_id, None);
    assert!(!empty.token_valid);
    assert_eq!(empty.net_worth, 0.0);

    harness.store_token(3_600).await;
    let mut events = harness.subscribe();
    harness.start_workers();
    let job = harness
        .runtime
        .enqueue_sync(CHARACTER, ResourceKind::Assets)
        .await
        .expect("enqueue");
    wait_for_terminal(&mut events, job.job_id).await;

    let overview = harness.runtime.overview().await.expect("overview");
    assert_eq!(overview.character_id, Some(CHARACTER));
    assert!(overview.token_valid);
    assert_eq!(overview.asset_count, 2);
    assert!((overview.net_worth - 2_050.0).abs() < f64::EPSILON);
    assert!(overview.assets_synced_at.is_some());
    assert_eq!(overview.industry_jobs_synced_at, None);
    assert_eq!(overview.sync_jobs_in_flight, 0);

    harness.stop_workers().await;
}

#[tokio::test]
async fn sde_index_loads_types_and_optional_groups() {
    let dir = tempfile::tempdir().expect("tempdir");
    tokio::fs::write(
        dir.path().join("types.jsonl"),
        "{\"_key\": 34, \"name\": {\"en\": \"Tritanium\"}, \"groupID\": 18, \"basePrice\": 2.0}\n",
    )
    .await
    .expect("write types");

    let without_groups = load_sde_index(dir.path()).await.expect("types only");
    assert_eq!(without_groups.type_count(), 1);
    assert_eq!(without_groups.group_count(), 0);

    tokio::fs::write(
        dir.path().join("groups.jsonl"),
        "{\"_key\": 18, \"name\": {\"en\": \"Mineral\"}, \"categoryID\": 4}\n",
    )
    .await
    .expect("write groups");
    let index = load_sde_index(dir.path()).await.expect("types and groups");
    assert_eq!(index.type_name(TypeId(34)), Some("Tritanium"));
    assert_eq!(index.group_count(), 1);

    let missing = load_sde_index(dir.path().join("absent"))
        .await
        .expect_err("types file required");
    assert!(matches!(missing, AppError::SdeFile { .. }));
}
