//! Harvest cycle integration tests against in-memory stores and stub collaborators.

mod helpers;

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use harvest_core::models::{MediaId, PageRequest, ProblemKind, ProblemStatus, UploadMode};
use harvest_db::{MediaStore, ProblemStore};
use harvest_engine::{
    CycleError, CycleOutcome, CycleReport, EngineSettings, Sha256Hasher, UploadFailure,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use harvest_orgs::{IgnoreRule, OrgPolicy};

use helpers::*;

fn completed(outcome: CycleOutcome) -> CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::AlreadyRunning => panic!("cycle unexpectedly reported as already running"),
    }
}

fn key(id: &str) -> MediaId {
    MediaId::new(ORG_ID, id)
}

/// PNG getting brighter from left to right.
fn gradient_png() -> Vec<u8> {
    let image = GrayImage::from_fn(90, 80, |x, _| Luma([(x * 2) as u8]));
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

#[tokio::test]
async fn auto_cycle_creates_hashes_and_uploads() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![
            raw_item("1", Some(2020), &["https://x.org/1.jpg"]),
            raw_item("2", Some(2021), &["https://x.org/2.mp4", "https://x.org/2.pdf"]),
        ]),
    )
    .await;

    let report = completed(h.engine.update_media(ORG_ID, false).await.unwrap());

    assert_eq!(report.fetched, 2);
    assert_eq!(report.created, 2);
    assert_eq!(report.uploaded, 2);
    assert_eq!(h.uploader.calls(), 2);
    assert_eq!(
        h.hasher.calls.load(std::sync::atomic::Ordering::SeqCst),
        3
    );

    let media = h.media_store.get(&key("2")).await.unwrap().unwrap();
    assert_eq!(
        media.files[0].target_filenames.iter().next().map(String::as_str),
        Some("File:Item 2 (2 1).mp4")
    );
    // documents are not a permitted type
    assert!(media.files[1].target_filenames.is_empty());

    let stats = report.statistics.unwrap();
    assert_eq!(stats.total_media, 2);
    assert_eq!(stats.uploaded_media, 2);
    assert_eq!(stats.missing_media, 1);
    assert_eq!(stats.hashed_media, 2);
    assert_eq!(stats.open_problems, 0);
}

#[tokio::test]
async fn upload_request_carries_policy_output() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;

    h.engine.update_media(ORG_ID, false).await.unwrap();

    let requests = h.uploader.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.filename, "Item 1 (1).jpg");
    assert!(request.licence_templates.contains("PD-USGov-NASA"));
    assert!(request.categories.contains("Photos by NASA"));
    assert!(request
        .categories
        .contains("Files from nasa uploaded by Harvest"));
    assert!(request.wikitext.contains("|author=NASA"));
    assert!(request.wikitext.contains("{{PD-USGov-NASA}}"));
}

#[tokio::test]
async fn second_run_without_upstream_change_is_idempotent() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![
            raw_item("1", Some(2020), &["https://x.org/1.jpg"]),
            raw_item("2", Some(2020), &["https://x.org/2.jpg"]),
        ]),
    )
    .await;
    h.adapter.mark_missing("2");

    let first = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    let second = completed(h.engine.update_media(ORG_ID, false).await.unwrap());

    assert_eq!(first.statistics, second.statistics);
    assert_eq!(second.uploaded, 0);
    assert_eq!(second.created, 0);
    assert_eq!(h.uploader.calls(), 1);

    assert_eq!(h.problem_store.len().await, 1);
    let problem = h.problem_store.get(&key("2")).await.unwrap().unwrap();
    assert_eq!(problem.kind, ProblemKind::MissingUpstream);
    assert_eq!(problem.occurrences, 2);
}

#[tokio::test]
async fn manual_mode_waits_for_human_trigger() {
    let h = harness(
        organization(UploadMode::Manual, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;

    let scheduled = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(scheduled.uploaded, 0);
    assert_eq!(scheduled.awaiting_manual, 1);
    assert_eq!(h.uploader.calls(), 0);

    let manual = completed(h.engine.update_media(ORG_ID, true).await.unwrap());
    assert_eq!(manual.uploaded, 1);
}

#[tokio::test]
async fn auto_from_date_respects_minimum_year_unless_manual() {
    let h = harness(
        organization(UploadMode::AutoFromDate, 2015, nasa_policy()),
        StubAdapter::with_items(vec![
            raw_item("old", Some(2010), &["https://x.org/old.jpg"]),
            raw_item("new", Some(2018), &["https://x.org/new.jpg"]),
            raw_item("undated", None, &["https://x.org/undated.jpg"]),
        ]),
    )
    .await;

    let scheduled = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(scheduled.uploaded, 1);
    assert_eq!(h.uploader.filenames(), vec!["Item new (new).jpg"]);

    let manual = completed(h.engine.update_media(ORG_ID, true).await.unwrap());
    assert_eq!(manual.uploaded, 2);
}

#[tokio::test]
async fn uploaded_file_is_never_uploaded_again() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;

    h.engine.update_media(ORG_ID, false).await.unwrap();
    h.engine.update_media(ORG_ID, true).await.unwrap();

    assert_eq!(h.uploader.calls(), 1);
}

#[tokio::test]
async fn ignore_rules_block_scheduled_uploads() {
    let policy = OrgPolicy {
        ignore_rules: vec![IgnoreRule {
            pattern: "(?i)item 1".to_string(),
            reason: "Title on block list".to_string(),
        }],
        ..nasa_policy()
    };
    let h = harness(
        organization(UploadMode::Auto, 0, policy),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;

    let scheduled = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(scheduled.uploaded, 0);
    assert_eq!(scheduled.ignored, 1);
    assert_eq!(scheduled.statistics.unwrap().ignored_media, 1);

    // "block list" is a soft reason a human may override
    let manual = completed(h.engine.update_media(ORG_ID, true).await.unwrap());
    assert_eq!(manual.uploaded, 1);
}

#[tokio::test]
async fn conflict_records_problem_and_file_stays_eligible() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;
    h.uploader
        .fail_with(Some(UploadFailure::conflict("Duplicate of File:Existing.jpg")));

    let first = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(first.problems_recorded, 1);
    let problem = h.problem_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(problem.kind, ProblemKind::UploadConflict);

    completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(h.uploader.calls(), 2);
    assert_eq!(h.problem_store.len().await, 1);

    h.uploader.fail_with(None);
    completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    let problem = h.problem_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(problem.status, ProblemStatus::Resolved);
}

#[tokio::test]
async fn upload_failure_applies_cooldown_to_scheduled_runs() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;
    h.uploader.fail_with(Some(UploadFailure::new(
        harvest_engine::UploadFailureKind::Quota,
        "rate limited",
    )));

    completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    let second = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(second.deferred, 1);
    assert_eq!(h.uploader.calls(), 1);

    h.uploader.fail_with(None);
    let manual = completed(h.engine.update_media(ORG_ID, true).await.unwrap());
    assert_eq!(manual.uploaded, 1);
    assert_eq!(h.uploader.calls(), 2);
}

#[tokio::test]
async fn rejected_file_does_not_hold_back_its_siblings() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item(
            "1",
            Some(2020),
            &["https://x.org/a.jpg", "https://x.org/b.jpg"],
        )]),
    )
    .await;
    h.uploader.fail_asset(
        "https://x.org/a.jpg",
        UploadFailure::new(harvest_engine::UploadFailureKind::BadName, "bad title"),
    );

    let first = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(first.uploaded, 1);
    assert_eq!(first.problems_recorded, 1);

    let media = h.media_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(media.files[0].upload_failures, 1);
    assert!(!media.files[0].is_uploaded());
    assert!(media.files[1].is_uploaded());
    assert_eq!(media.files[1].upload_failures, 0);

    // the sibling's success leaves the failing file's problem open
    let problem = h.problem_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(problem.kind, ProblemKind::UploadFailure);
    assert_eq!(problem.status, ProblemStatus::Open);

    let second = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(second.deferred, 1);
    assert_eq!(second.uploaded, 0);
    assert_eq!(h.uploader.calls(), 2);

    h.uploader.asset_failures.lock().unwrap().clear();
    let manual = completed(h.engine.update_media(ORG_ID, true).await.unwrap());
    assert_eq!(manual.uploaded, 1);
    let problem = h.problem_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(problem.status, ProblemStatus::Resolved);
}

#[tokio::test]
async fn refused_asset_is_recorded_and_the_page_goes_on() {
    let mut server = mockito::Server::new_async().await;
    let refused = server
        .mock("GET", "/1.png")
        .with_status(403)
        .expect(2)
        .create_async()
        .await;
    for path in ["/2.png", "/3.png"] {
        server
            .mock("GET", path)
            .with_status(200)
            .with_body(gradient_png())
            .create_async()
            .await;
    }
    let url = |n: &str| format!("{}/{}.png", server.url(), n);

    let hasher = Arc::new(Sha256Hasher::new(Duration::from_secs(5)).unwrap());
    let h = harness_hashing_with(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![
            raw_item("1", Some(2020), &[url("1").as_str()]),
            raw_item("2", Some(2020), &[url("2").as_str()]),
            raw_item("3", Some(2020), &[url("3").as_str()]),
        ]),
        hasher,
    )
    .await;

    let first = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(first.fetched, 3);
    assert_eq!(first.created, 3);
    assert_eq!(first.uploaded, 2);
    assert_eq!(first.skipped, 0);
    assert_eq!(h.uploader.calls(), 2);

    let problem = h.problem_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(problem.kind, ProblemKind::ProcessingFailure);
    assert!(problem.error_message.contains("refused"));

    let unhashed = h.media_store.get(&key("1")).await.unwrap().unwrap();
    assert!(unhashed.files[0].sha256.is_none());
    assert!(!unhashed.files[0].is_uploaded());

    let hashed = h.media_store.get(&key("2")).await.unwrap().unwrap();
    assert_eq!(hashed.files[0].phash.as_deref(), Some("0000000000000000"));
    assert_eq!(first.statistics.unwrap().hashed_media, 2);

    // the organization keeps cycling, the refused asset is tried again
    let second = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(second.fetched, 3);
    assert_eq!(second.uploaded, 0);
    assert_eq!(h.uploader.calls(), 2);
    let problem = h.problem_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(problem.occurrences, 2);
    refused.assert_async().await;
}

#[tokio::test]
async fn cleaned_description_is_not_an_update() {
    let policy = OrgPolicy {
        description_removals: vec!["(?m)^Credit: NASA$".to_string()],
        ..nasa_policy()
    };
    let mut item = raw_item("1", Some(2020), &["https://x.org/1.jpg"]);
    item.description = Some("A galaxy\nCredit: NASA".to_string());
    let h = harness(
        organization(UploadMode::Auto, 0, policy),
        StubAdapter::with_items(vec![item]),
    )
    .await;

    let first = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(first.created, 1);
    let stored = h.media_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("A galaxy"));

    let second = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(second.updated, 0);
    let again = h.media_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(again.updated_at, stored.updated_at);
}

#[tokio::test]
async fn missing_licence_is_a_processing_failure() {
    let policy = OrgPolicy {
        licence_templates: Vec::new(),
        ..nasa_policy()
    };
    let h = harness(
        organization(UploadMode::Auto, 0, policy),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;

    let report = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(report.uploaded, 0);
    let problem = h.problem_store.get(&key("1")).await.unwrap().unwrap();
    assert_eq!(problem.kind, ProblemKind::ProcessingFailure);
    assert_eq!(h.uploader.calls(), 0);
}

#[tokio::test]
async fn transient_refresh_skips_item_without_problem() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![
            raw_item("1", Some(2020), &["https://x.org/1.jpg"]),
            raw_item("2", Some(2020), &["https://x.org/2.jpg"]),
        ]),
    )
    .await;
    h.adapter.fail_refresh_transiently("1");

    let report = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(report.skipped, 1);
    assert_eq!(report.uploaded, 1);
    assert!(h.problem_store.is_empty().await);
    assert!(h.media_store.get(&key("1")).await.unwrap().is_none());
}

#[tokio::test]
async fn transient_fetch_failure_ends_cycle_quietly() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;
    h.adapter.fail_fetch(Some(false));

    let report = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(report.fetched, 0);
    assert!(h.problem_store.is_empty().await);
}

#[tokio::test]
async fn fatal_fetch_aborts_cycle_and_releases_guard() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;
    h.adapter.fail_fetch(Some(true));

    let err = h.engine.update_media(ORG_ID, false).await.unwrap_err();
    assert!(matches!(err, CycleError::Source { .. }));
    assert!(!h.engine.guards().is_running(ORG_ID));

    h.adapter.fail_fetch(None);
    let report = completed(h.engine.update_media(ORG_ID, false).await.unwrap());
    assert_eq!(report.uploaded, 1);
}

#[tokio::test]
async fn unknown_organization_is_an_error() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::default(),
    )
    .await;

    let err = h.engine.update_media("esa", false).await.unwrap_err();
    assert!(matches!(err, CycleError::Harvest(_)));
    assert!(!h.engine.guards().is_running("esa"));
}

#[tokio::test]
async fn simultaneous_triggers_run_one_cycle() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::slow(
            vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])],
            Duration::from_millis(100),
        ),
    )
    .await;

    let (a, b) = tokio::join!(
        h.engine.update_media(ORG_ID, false),
        h.engine.update_media(ORG_ID, false)
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let completed_count = outcomes
        .iter()
        .filter(|o| matches!(o, CycleOutcome::Completed(_)))
        .count();
    assert_eq!(completed_count, 1);
    assert!(outcomes.contains(&CycleOutcome::AlreadyRunning));
    assert_eq!(h.adapter.cursors_seen().len(), 1);
}

#[tokio::test]
async fn cursor_advances_and_wraps() {
    let h = harness_with(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![
            raw_item("1", Some(2020), &["https://x.org/1.jpg"]),
            raw_item("2", Some(2020), &["https://x.org/2.jpg"]),
            raw_item("3", Some(2020), &["https://x.org/3.jpg"]),
        ]),
        EngineSettings {
            page_size: 2,
            ..Default::default()
        },
    )
    .await;

    for _ in 0..3 {
        h.engine.update_media(ORG_ID, false).await.unwrap();
    }

    assert_eq!(
        h.adapter.cursors_seen(),
        vec![None, Some("2".to_string()), None]
    );
    assert_eq!(h.media_store.len().await, 3);
}

#[tokio::test]
async fn manual_single_media_upload() {
    let h = harness(
        organization(UploadMode::Manual, 0, nasa_policy()),
        StubAdapter::with_items(vec![
            raw_item("1", Some(2020), &["https://x.org/1.jpg"]),
            raw_item("2", Some(2020), &["https://x.org/2.jpg"]),
        ]),
    )
    .await;
    h.engine.update_media(ORG_ID, false).await.unwrap();

    let report = completed(h.engine.upload_media(&key("2")).await.unwrap());
    assert_eq!(report.uploaded, 1);
    assert_eq!(h.uploader.filenames(), vec!["Item 2 (2).jpg"]);

    let err = h.engine.upload_media(&key("404")).await.unwrap_err();
    assert!(matches!(err, CycleError::MediaNotFound(_)));
}

#[tokio::test]
async fn manual_review_of_problems() {
    let h = harness(
        organization(UploadMode::Auto, 0, nasa_policy()),
        StubAdapter::with_items(vec![raw_item("1", Some(2020), &["https://x.org/1.jpg"])]),
    )
    .await;
    h.adapter.mark_missing("1");
    h.engine.update_media(ORG_ID, false).await.unwrap();

    let tracker = h.engine.tracker();
    let open = tracker
        .list(ORG_ID, Some(ProblemStatus::Open), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(open.total, 1);

    tracker.mark_reviewed(&key("1")).await.unwrap();
    let stats = h.engine.current_statistics(ORG_ID).await.unwrap();
    assert_eq!(stats.open_problems, 0);

    assert!(tracker.delete(&key("1")).await.unwrap());
    assert!(h.problem_store.is_empty().await);
}
