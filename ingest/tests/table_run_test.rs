mod common;

use common::Harness;
use ingest::credentials::memory::MemoryCredentialProvider;
use ingest::error::ErrorKind;
use ingest::test_utils::fixtures::{pages, table_spec};
use ingest::test_utils::memory_source::ScriptedFetch;
use ingest::test_utils::timeline::TimelineEvent;
use ingest::types::RunStatus;
use ingest_config::shared::LoadType;
use ingest_telemetry::init_test_tracing;

const STAGING_PREFIX: &str = "DEV/CRM/USERS/USERS";
const PROCESSED_PREFIX: &str = "PROCESSED/DEV/CRM/USERS/USERS";
const QUALIFIED_TABLE: &str = "raw.crm.users";

#[tokio::test(flavor = "multi_thread")]
async fn three_single_record_pages_with_batch_of_two_flush_twice() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, false);
    let source = harness.source("users", pages(&[1, 1, 1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 2);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Successful);
    assert_eq!(stats.counters.pages, 3);
    assert_eq!(stats.counters.records, 3);
    assert_eq!(stats.counters.flushes, 2);
    assert!(stats.ended_at >= stats.started_at);

    let uploads = harness.timeline.filter(TimelineEvent::is_upload).await;
    assert_eq!(
        uploads,
        vec![
            TimelineEvent::Upload {
                prefix: STAGING_PREFIX.to_owned(),
                objects: 2
            },
            TimelineEvent::Upload {
                prefix: STAGING_PREFIX.to_owned(),
                objects: 1
            },
        ]
    );
    assert_eq!(harness.warehouse.scripts_run("full_load/USERS.sql").await, 2);

    // The first flush happens after the second page and before the third.
    let events = harness.timeline.events().await;
    let first_upload = events.iter().position(TimelineEvent::is_upload).unwrap();
    let second_fetch = events
        .iter()
        .position(|event| matches!(event, TimelineEvent::Fetch { page: 1, .. }))
        .unwrap();
    let third_fetch = events
        .iter()
        .position(|event| matches!(event, TimelineEvent::Fetch { page: 2, .. }))
        .unwrap();
    assert!(second_fetch < first_upload && first_upload < third_fetch);

    // Cleanup leaves neither staged objects nor local files behind.
    assert!(harness.stager.inner().is_empty().await);
    assert_eq!(harness.local_files(&spec), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_page_becomes_one_file_including_an_empty_last_page() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::IncrementalLoad, false);
    let source = harness.source("users", pages(&[3, 2, 0]));
    let runner = harness.runner(&[spec.clone()], vec![source], 10);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Successful);
    assert_eq!(stats.counters.pages, 3);
    assert_eq!(stats.counters.records, 5);
    assert_eq!(stats.counters.flushes, 1);
    assert_eq!(
        harness.timeline.filter(TimelineEvent::is_upload).await,
        vec![TimelineEvent::Upload {
            prefix: STAGING_PREFIX.to_owned(),
            objects: 3
        }]
    );
    assert_eq!(
        harness.warehouse.scripts_run("incremental_load/USERS.sql").await,
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn flushes_after_every_page_with_a_batch_of_one() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, false);
    let source = harness.source("users", pages(&[2, 2, 2, 2]));
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.counters.flushes, 4);
    assert_eq!(harness.timeline.count(TimelineEvent::is_archive).await, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn reload_truncates_once_before_the_first_fetch() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::Reload, false);
    let source = harness.source("users", pages(&[1, 1, 1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Successful);
    assert_eq!(harness.warehouse.truncates().await, vec![QUALIFIED_TABLE]);

    let truncate = harness
        .timeline
        .position(TimelineEvent::is_truncate)
        .await
        .unwrap();
    let first_fetch = harness
        .timeline
        .position(|event| event.is_fetch_of("users"))
        .await
        .unwrap();
    assert!(truncate < first_fetch);
    assert_eq!(harness.warehouse.scripts_run("reload/USERS.sql").await, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn other_load_types_never_truncate() {
    init_test_tracing();
    let harness = Harness::new();
    let full = table_spec("users", LoadType::FullLoad, false);
    let incremental = table_spec("accounts", LoadType::IncrementalLoad, false);
    let runner = harness.runner(
        &[full.clone(), incremental.clone()],
        vec![
            harness.source("users", pages(&[1])),
            harness.source("accounts", pages(&[1])),
        ],
        5,
    );

    runner.run(&full).await;
    runner.run(&incremental).await;

    assert!(harness.warehouse.truncates().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_truncate_fails_the_run_before_any_fetch() {
    init_test_tracing();
    let harness = Harness::new();
    harness.warehouse.fail_truncate(QUALIFIED_TABLE).await;
    let spec = table_spec("users", LoadType::Reload, false);
    let source = harness.source("users", pages(&[1, 1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Unsuccessful);
    assert_eq!(stats.error_kind, Some(ErrorKind::TruncateFailed));
    assert!(stats.error.as_deref().unwrap().contains(QUALIFIED_TABLE));
    assert_eq!(stats.counters.pages, 0);
    assert_eq!(stats.counters.flushes, 0);
    assert_eq!(
        harness
            .timeline
            .count(|event| event.is_fetch_of("users"))
            .await,
        0
    );
    assert_eq!(harness.timeline.count(TimelineEvent::is_upload).await, 0);
    assert_eq!(harness.warehouse.scripts_run("USERS.sql").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn soft_delete_runs_once_after_the_last_flush_and_before_cleanup() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, true);
    let source = harness.source("users", pages(&[1, 1, 1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 2);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Successful);
    assert_eq!(harness.warehouse.scripts_run("soft_delete/USERS.sql").await, 1);

    let soft_delete = harness
        .timeline
        .position(|event| event.is_script("soft_delete/USERS.sql"))
        .await
        .unwrap();
    let last_archive = harness
        .timeline
        .last_position(TimelineEvent::is_archive)
        .await
        .unwrap();
    let cleanup = harness
        .timeline
        .last_position(|event| event.is_delete_of(PROCESSED_PREFIX))
        .await
        .unwrap();
    assert!(last_archive < soft_delete);
    assert!(soft_delete < cleanup);
}

#[tokio::test(flavor = "multi_thread")]
async fn soft_delete_is_skipped_when_disabled() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, false);
    let source = harness.source("users", pages(&[1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 2);

    runner.run(&spec).await;

    assert_eq!(harness.warehouse.scripts_run("soft_delete").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_soft_delete_still_cleans_up_staged_and_local_files() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, true);
    harness.warehouse.fail_scripts("soft_delete/USERS.sql", 1).await;
    let source = harness.source("users", pages(&[1, 1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Unsuccessful);
    assert_eq!(stats.error_kind, Some(ErrorKind::SoftDeleteFailed));
    assert_eq!(stats.counters.flushes, 2);
    assert_eq!(harness.warehouse.scripts_run("soft_delete").await, 0);

    let last_archive = harness
        .timeline
        .last_position(TimelineEvent::is_archive)
        .await
        .unwrap();
    let cleanup = harness
        .timeline
        .last_position(|event| event.is_delete_of(PROCESSED_PREFIX))
        .await
        .unwrap();
    assert!(last_archive < cleanup);
    assert!(harness.stager.inner().is_empty().await);
    assert_eq!(harness.local_files(&spec), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_first_authentication_ends_the_run_without_loading() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, true);
    let source = harness
        .source("users", pages(&[1, 1]))
        .reject_authentication(0);
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Successful);
    assert_eq!(stats.counters.pages, 0);
    assert_eq!(stats.counters.flushes, 0);
    assert_eq!(
        harness
            .timeline
            .count(|event| event.is_fetch_of("users"))
            .await,
        0
    );
    assert_eq!(harness.timeline.count(TimelineEvent::is_upload).await, 0);
    assert_eq!(harness.warehouse.scripts_run("soft_delete").await, 0);
    assert_eq!(harness.local_files(&spec), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_authentication_after_pages_fails_without_flushing() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, true);
    let source = harness
        .source("users", pages(&[1, 1, 1]))
        .reject_authentication(1);
    let runner = harness.runner(&[spec.clone()], vec![source], 10);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Unsuccessful);
    assert_eq!(stats.error_kind, Some(ErrorKind::AuthenticationError));
    assert_eq!(stats.counters.pages, 1);
    assert_eq!(stats.counters.flushes, 0);
    assert_eq!(harness.timeline.count(TimelineEvent::is_upload).await, 0);
    assert_eq!(harness.warehouse.scripts_run("soft_delete").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_failure_keeps_earlier_flushes_and_fails_the_run() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::IncrementalLoad, true);
    let source = harness
        .source("users", pages(&[1, 1, 1]))
        .script_page(1, ScriptedFetch::Fail(ErrorKind::SourceFetchFailed));
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Unsuccessful);
    assert_eq!(stats.error_kind, Some(ErrorKind::SourceFetchFailed));
    assert_eq!(stats.counters.pages, 1);
    assert_eq!(stats.counters.flushes, 1);
    assert_eq!(harness.warehouse.scripts_run("soft_delete").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_failure_aborts_the_run_without_archiving() {
    init_test_tracing();
    let harness = Harness::new();
    harness
        .warehouse
        .fail_scripts("full_load/USERS.sql", 1)
        .await;
    let spec = table_spec("users", LoadType::FullLoad, false);
    let source = harness.source("users", pages(&[1, 1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Unsuccessful);
    assert_eq!(stats.error_kind, Some(ErrorKind::MergeFailed));
    assert_eq!(stats.counters.pages, 1);
    assert_eq!(stats.counters.flushes, 0);
    assert_eq!(harness.timeline.count(TimelineEvent::is_archive).await, 0);
    assert_eq!(
        harness
            .timeline
            .count(|event| event.is_fetch_of("users"))
            .await,
        1
    );
    // Staged files stay in place until the next attempt resets them.
    assert_eq!(harness.stager.inner().keys(STAGING_PREFIX).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_failure_fails_the_run() {
    init_test_tracing();
    let harness = Harness::new();
    harness.stager.fail_uploads(1).await;
    let spec = table_spec("users", LoadType::FullLoad, false);
    let source = harness.source("users", pages(&[1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 1);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Unsuccessful);
    assert_eq!(stats.error_kind, Some(ErrorKind::StageUploadFailed));
    assert_eq!(harness.warehouse.scripts_run("USERS.sql").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_credentials_fail_only_at_the_start() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::Reload, false);
    let source = harness.source("users", pages(&[1]));
    let runner = harness.runner_with(
        &[spec.clone()],
        vec![source],
        1,
        harness.warehouse.clone(),
        MemoryCredentialProvider::new(),
    );

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Unsuccessful);
    assert_eq!(stats.error_kind, Some(ErrorKind::MissingCredentials));
    assert!(harness.timeline.events().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_removes_leftovers_of_a_failed_attempt() {
    init_test_tracing();
    let harness = Harness::new();
    let spec = table_spec("users", LoadType::FullLoad, false);
    let local_dir = harness.local_dir(&spec);
    std::fs::create_dir_all(&local_dir).unwrap();
    std::fs::write(local_dir.join("users_000009_stale.tsv"), "999\tstale\n").unwrap();

    let source = harness.source("users", pages(&[1]));
    let runner = harness.runner(&[spec.clone()], vec![source], 5);

    let stats = runner.run(&spec).await;

    assert_eq!(stats.status, RunStatus::Successful);
    assert_eq!(
        harness.timeline.filter(TimelineEvent::is_upload).await,
        vec![TimelineEvent::Upload {
            prefix: STAGING_PREFIX.to_owned(),
            objects: 1
        }]
    );
}
