//! End-to-end job flow against the in-memory sandbox API: mixed
//! success/skip runs, retry behavior, pause/resume, and the done-label
//! idempotency guarantee.

use std::sync::Arc;
use std::time::Duration;

use thema_core::ads::{ad_group_resource, AdRecord, AdStatus, CampaignRecord};
use thema_core::config::AppConfig;
use thema_core::types::{AdGroupTarget, ItemStatus, JobStatus};
use thema_core::RemoteError;
use thema_engine::{JobOrchestrator, MemoryJobStore, ThemeTemplates};
use thema_remote::{AccountState, InMemoryAdsApi};

fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 4;
    config.retry.jitter = false;
    config
}

fn orchestrator_with(api: Arc<InMemoryAdsApi>, config: AppConfig) -> JobOrchestrator {
    JobOrchestrator::new(
        Arc::new(MemoryJobStore::new()),
        api,
        Arc::new(ThemeTemplates::new()),
        config,
    )
}

fn target(account: &str, ad_group: &str) -> AdGroupTarget {
    AdGroupTarget {
        account_id: account.to_string(),
        ad_group_id: ad_group.to_string(),
        campaign_id: None,
        campaign_name: None,
    }
}

fn seeded_ad(account: &str, ad_group_id: &str) -> AdRecord {
    let ad_group = ad_group_resource(account, ad_group_id);
    AdRecord {
        resource_name: format!("{ad_group}~existing"),
        ad_group,
        status: AdStatus::Enabled,
        headlines: vec!["One".into(), "Two".into(), "Three".into()],
        descriptions: vec!["Base description".into()],
        final_urls: vec!["https://example.com/p".into()],
        path1: None,
        path2: None,
    }
}

#[tokio::test]
async fn test_mixed_job_completes_with_expected_counts() {
    let api = Arc::new(InMemoryAdsApi::new());
    api.seed_account(
        "111",
        AccountState {
            ads: vec![seeded_ad("111", "1"), seeded_ad("111", "2")],
            campaigns: vec![CampaignRecord {
                resource_name: "customers/111/campaigns/900".into(),
                id: "900".into(),
                name: "Shoes".into(),
            }],
            ..AccountState::default()
        },
    );
    // account 222 exists but its ad group has no ad
    api.seed_account("222", AccountState::default());

    let orchestrator = orchestrator_with(api.clone(), fast_config());
    let mut first = target("111", "1");
    first.campaign_name = Some("Shoes".to_string());
    let targets = vec![first, target("111", "2"), target("222", "9")];

    let job = orchestrator
        .create_job(&targets, Some("upload:targets.json".to_string()))
        .unwrap();
    let job = orchestrator.process_job(job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total, 3);
    assert_eq!(job.processed, 3);
    assert_eq!(job.successful, 2);
    assert_eq!(job.skipped, 1);
    assert_eq!(job.failed, 0);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());

    let snapshot = orchestrator.get_job_status(job.id).unwrap();
    assert_eq!(snapshot.processed, snapshot.successful + snapshot.failed + snapshot.skipped);

    let items = orchestrator.list_job_items(job.id).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].status, ItemStatus::Success);
    assert!(items[0].new_ad_resource.is_some());
    // campaign id backfilled from the prefetched campaign map
    assert_eq!(items[0].campaign_id.as_deref(), Some("900"));
    assert_eq!(items[2].status, ItemStatus::Skipped);
    assert_eq!(items[2].error_message.as_deref(), Some("no_existing_ad"));

    let report = orchestrator.failure_report(job.id).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 2); // header + the one skipped target
    assert!(lines[1].contains("222"));
    assert!(lines[1].contains("skipped"));
    assert!(lines[1].contains("no_existing_ad"));
}

#[tokio::test]
async fn test_transient_mutation_errors_retried_to_success() {
    let api = Arc::new(InMemoryAdsApi::new());
    api.seed_account(
        "111",
        AccountState {
            ads: vec![seeded_ad("111", "1")],
            ..AccountState::default()
        },
    );
    api.inject_fault("create_ads", RemoteError::Transient("RATE_LIMIT".into()));
    api.inject_fault("create_ads", RemoteError::Transient("RATE_LIMIT".into()));

    let orchestrator = orchestrator_with(api.clone(), fast_config());
    let job = orchestrator.create_job(&[target("111", "1")], None).unwrap();
    let job = orchestrator.process_job(job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.successful, 1);
    // two transient failures, success on the third attempt
    assert_eq!(api.calls("create_ads"), 3);
}

#[tokio::test]
async fn test_exhausted_retries_fail_only_that_account() {
    let api = Arc::new(InMemoryAdsApi::new());
    api.seed_account(
        "111",
        AccountState {
            ads: vec![seeded_ad("111", "1")],
            ..AccountState::default()
        },
    );
    api.seed_account(
        "222",
        AccountState {
            ads: vec![seeded_ad("222", "2")],
            ..AccountState::default()
        },
    );
    // every create_ads attempt for the first account pass fails
    for _ in 0..3 {
        api.inject_fault("create_ads", RemoteError::Transient("TIMEOUT".into()));
    }

    let mut config = fast_config();
    // one account at a time so the faults land on the first pass only
    config.performance.max_concurrent_accounts = 1;
    let orchestrator = orchestrator_with(api.clone(), config);

    let job = orchestrator
        .create_job(&[target("111", "1"), target("222", "2")], None)
        .unwrap();
    let job = orchestrator.process_job(job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.successful, 1);
    assert_eq!(job.failed, 1);
    assert_eq!(job.processed, 2);
}

#[tokio::test]
async fn test_pause_lets_in_flight_accounts_finish_then_resume() {
    let api = Arc::new(InMemoryAdsApi::new().with_latency(Duration::from_millis(100)));
    for account in ["111", "222", "333"] {
        api.seed_account(
            account,
            AccountState {
                ads: vec![seeded_ad(account, "1")],
                ..AccountState::default()
            },
        );
    }

    let mut config = fast_config();
    config.performance.max_concurrent_accounts = 2;
    let orchestrator = Arc::new(orchestrator_with(api.clone(), config));

    let job = orchestrator
        .create_job(
            &[target("111", "1"), target("222", "1"), target("333", "1")],
            None,
        )
        .unwrap();
    let job_id = job.id;

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.process_job(job_id).await })
    };

    // Let the first two accounts get in flight, then request a pause.
    tokio::time::sleep(Duration::from_millis(30)).await;
    orchestrator.pause_job(job_id).unwrap();

    let job = runner.await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Paused);
    assert_eq!(job.processed, 2);
    assert_eq!(job.successful, 2);

    let items = api.calls("create_ads");
    assert_eq!(items, 2, "third account must never start");

    // Resume finishes the remaining account and never re-processes the
    // successful ones.
    let job = orchestrator.resume_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.successful, 3);
    assert_eq!(job.processed, 3);
    assert_eq!(api.calls("create_ads"), 3);
}

#[tokio::test]
async fn test_done_label_makes_second_job_skip() {
    let api = Arc::new(InMemoryAdsApi::new());
    api.seed_account(
        "111",
        AccountState {
            ads: vec![seeded_ad("111", "1")],
            ..AccountState::default()
        },
    );

    let orchestrator = orchestrator_with(api.clone(), fast_config());

    let first = orchestrator.create_job(&[target("111", "1")], None).unwrap();
    let first = orchestrator.process_job(first.id).await.unwrap();
    assert_eq!(first.successful, 1);
    assert_eq!(api.calls("create_ads"), 1);

    // The ad group now carries the done label; a second run must not
    // publish a duplicate.
    let second = orchestrator.create_job(&[target("111", "1")], None).unwrap();
    let second = orchestrator.process_job(second.id).await.unwrap();

    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.successful, 0);
    assert_eq!(api.calls("create_ads"), 1, "no second publish");

    let items = orchestrator.failure_report(second.id).unwrap();
    assert!(items.contains("already_processed"));
}

#[tokio::test]
async fn test_delete_refused_while_running() {
    let api = Arc::new(InMemoryAdsApi::new().with_latency(Duration::from_millis(100)));
    api.seed_account(
        "111",
        AccountState {
            ads: vec![seeded_ad("111", "1")],
            ..AccountState::default()
        },
    );

    let orchestrator = Arc::new(orchestrator_with(api, fast_config()));
    let job = orchestrator.create_job(&[target("111", "1")], None).unwrap();
    let job_id = job.id;

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.process_job(job_id).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(orchestrator.delete_job(job_id).is_err());

    runner.await.unwrap().unwrap();
    orchestrator.delete_job(job_id).unwrap();
}
