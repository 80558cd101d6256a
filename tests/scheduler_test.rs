//! Scheduler and check_alerts job tests

mod common;

use common::{hit, Harness, ScriptedIndex};
use query_alert_engine::scheduler::{
    register_default_jobs, Job, JobMetadata, JobStatus, SchedulerConfig, SchedulerConfigBuilder,
    SchedulerError, SchedulerService, CHECK_ALERTS_JOB,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[tokio::test]
async fn test_scheduler_start_stop() {
    let mut scheduler = SchedulerService::new(SchedulerConfig::default(), CancellationToken::new())
        .await
        .expect("Failed to create scheduler");

    scheduler.start().await.unwrap();
    assert!(scheduler.is_running().await);

    scheduler.shutdown().await.unwrap();
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn test_disabled_scheduler_does_not_start() {
    let config = SchedulerConfigBuilder::new().enabled(false).build();
    let mut scheduler = SchedulerService::new(config, CancellationToken::new()).await.unwrap();

    scheduler.start().await.unwrap();
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn test_check_alerts_job_runs_a_cycle() {
    let harness = Harness::new();
    let owner = harness.role("analyst").await;
    let alert = harness.alert(&owner, "acme corp").await;
    let scanner = Arc::new(harness.scanner(Arc::new(ScriptedIndex::with_hits(vec![hit(
        "e-1",
        "Acme Corp",
        None,
    )]))));

    let config = SchedulerConfig::default();
    let scheduler = SchedulerService::new(config.clone(), CancellationToken::new()).await.unwrap();
    let ids = register_default_jobs(&scheduler, &config, scanner).await.unwrap();
    assert_eq!(ids.len(), 1);

    scheduler.run_now(&ids[0]).await.unwrap();

    let metadata = scheduler.get_job_metadata(&ids[0]).await.unwrap();
    assert_eq!(metadata.name, CHECK_ALERTS_JOB);
    assert_eq!(metadata.run_count, 1);
    assert_eq!(metadata.status, JobStatus::Completed);

    assert_eq!(harness.publisher.len(), 1);
    assert!(harness.stored(&alert.id).await.notified_at.is_some());
}

#[tokio::test]
async fn test_disabled_check_alerts_is_not_registered() {
    let harness = Harness::new();
    let scanner = Arc::new(harness.scanner(Arc::new(ScriptedIndex::new())));

    let config = SchedulerConfigBuilder::new().check_alerts_enabled(false).build();
    let scheduler = SchedulerService::new(config.clone(), CancellationToken::new()).await.unwrap();

    let ids = register_default_jobs(&scheduler, &config, scanner).await.unwrap();
    assert!(ids.is_empty());
    assert!(scheduler.list_jobs().await.is_empty());
}

#[tokio::test]
async fn test_timed_out_cycle_keeps_watermark() {
    let harness = Harness::new();
    let owner = harness.role("analyst").await;
    let alert = harness.alert(&owner, "acme corp").await;
    let index = ScriptedIndex::new().with_delay(Duration::from_secs(30));
    let scanner = Arc::new(harness.scanner(Arc::new(index)));

    let config = SchedulerConfigBuilder::new()
        .job_timeout(Duration::from_secs(1))
        .build();
    let scheduler = SchedulerService::new(config.clone(), CancellationToken::new()).await.unwrap();
    let ids = register_default_jobs(&scheduler, &config, scanner).await.unwrap();

    let result = scheduler.run_now(&ids[0]).await;
    assert!(matches!(result, Err(SchedulerError::JobTimedOut(1))));

    let metadata = scheduler.get_job_metadata(&ids[0]).await.unwrap();
    assert_eq!(metadata.failure_count, 1);
    assert_eq!(harness.stored(&alert.id).await.notified_at, None);
}

#[tokio::test]
async fn test_shutdown_token_prevents_new_executions() {
    let counter = Arc::new(AtomicUsize::new(0));
    let job_counter = counter.clone();
    let job = Job::new(JobMetadata::new("counting", "0 0 0 1 1 *"), move |_ctx| {
        let counter = job_counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let shutdown = CancellationToken::new();
    let scheduler = SchedulerService::new(SchedulerConfig::default(), shutdown.clone())
        .await
        .unwrap();
    let id = scheduler.add_job(job).await.unwrap();

    scheduler.run_now(&id).await.unwrap();
    shutdown.cancel();
    scheduler.run_now(&id).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_and_removed_jobs() {
    let scheduler = SchedulerService::new(SchedulerConfig::default(), CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        scheduler.run_now(&Uuid::new_v4()).await,
        Err(SchedulerError::JobNotFound(_))
    ));

    let job = Job::new(JobMetadata::new("noop", "0 0 0 1 1 *"), |_ctx| async { Ok(()) });
    let id = scheduler.add_job(job).await.unwrap();
    assert_eq!(scheduler.get_stats().await.total_jobs, 1);

    scheduler.remove_job(&id).await.unwrap();
    assert!(matches!(
        scheduler.get_job_metadata(&id).await,
        Err(SchedulerError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_schedule_is_rejected() {
    let scheduler = SchedulerService::new(SchedulerConfig::default(), CancellationToken::new())
        .await
        .unwrap();

    let job = Job::new(JobMetadata::new("broken", "every now and then"), |_ctx| async { Ok(()) });
    assert!(matches!(
        scheduler.add_job(job).await,
        Err(SchedulerError::JobCreationFailed(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cron_fires_check_alerts() {
    let harness = Harness::new();
    let owner = harness.role("analyst").await;
    harness.alert(&owner, "acme corp").await;
    let scanner = Arc::new(harness.scanner(Arc::new(ScriptedIndex::new())));

    let config = SchedulerConfigBuilder::new()
        .check_alerts_schedule("* * * * * *")
        .build();
    let mut scheduler = SchedulerService::new(config.clone(), CancellationToken::new()).await.unwrap();
    let ids = register_default_jobs(&scheduler, &config, scanner).await.unwrap();

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    scheduler.shutdown().await.unwrap();

    let metadata = scheduler.get_job_metadata(&ids[0]).await.unwrap();
    assert!(metadata.run_count >= 1, "check_alerts should have fired");
}
