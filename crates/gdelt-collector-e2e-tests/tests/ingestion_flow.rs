use gdelt_collector_e2e_tests::{
    EVENT_TOPIC, MENTION_TOPIC, TestHarness, build_zip, init_tracing, md5_hex_of, wait_until,
};
use gdelt_collector_lib::error::CollectorError;
use gdelt_collector_lib::storage::ObjectStore;

const EXPORT_ARCHIVE: &str = "20250323151500.translation.export.CSV.zip";
const MENTION_ARCHIVE: &str = "20250323151500.translation.mentions.CSV.zip";
const EXPORT_MEMBER: &str = "20250323151500.translation.export.CSV";
const MENTION_MEMBER: &str = "20250323151500.translation.mentions.CSV";

#[tokio::test]
async fn test_happy_path_processes_two_new_archives() {
    init_tracing();
    let harness = TestHarness::start().await;

    let export_zip = build_zip(&[(EXPORT_MEMBER, b"event rows".as_slice())]);
    let mention_zip = build_zip(&[(MENTION_MEMBER, b"mention rows".as_slice())]);
    let export_hash = md5_hex_of(&export_zip);
    let mention_hash = md5_hex_of(&mention_zip);

    let export_line = harness.server.put_archive(EXPORT_ARCHIVE, export_zip);
    let mention_line = harness.server.put_archive(MENTION_ARCHIVE, mention_zip);
    harness
        .server
        .set_manifest(&format!("{}\n{}\n", export_line, mention_line));

    let summary = harness.coordinator.tick().await.expect("tick should succeed");

    assert_eq!(summary.parsed, 2);
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);

    let hashes = harness.hash_store.snapshot();
    assert_eq!(hashes.get(EXPORT_ARCHIVE), Some(&export_hash));
    assert_eq!(hashes.get(MENTION_ARCHIVE), Some(&mention_hash));

    assert_eq!(
        harness.object_store.object_names(),
        vec![EXPORT_MEMBER.to_string(), MENTION_MEMBER.to_string()]
    );
    assert_eq!(
        harness.object_store.object(EXPORT_MEMBER),
        Some(b"event rows".to_vec())
    );

    assert!(
        wait_until(|| harness.publisher.sends().len() >= 2, 5).await,
        "both URLs should be published"
    );
    let sends = harness.publisher.sends();
    let export_url = harness.object_store.url(EXPORT_MEMBER);
    let mention_url = harness.object_store.url(MENTION_MEMBER);
    assert!(sends.contains(&(EVENT_TOPIC.to_string(), export_url.clone())));
    assert!(sends.contains(&(MENTION_TOPIC.to_string(), mention_url.clone())));

    assert!(
        wait_until(
            || {
                harness.status_store.sent(&export_url) == Some(true)
                    && harness.status_store.sent(&mention_url) == Some(true)
            },
            5
        )
        .await,
        "both records should be marked sent after broker acknowledgment"
    );

    assert!(
        harness.download_dir_files().is_empty(),
        "archives and scratch directories should be gone after success, found {:?}",
        harness.download_dir_files()
    );
}

#[tokio::test]
async fn test_unchanged_manifest_is_a_noop() {
    init_tracing();
    let harness = TestHarness::start().await;

    let export_zip = build_zip(&[(EXPORT_MEMBER, b"event rows".as_slice())]);
    let mention_zip = build_zip(&[(MENTION_MEMBER, b"mention rows".as_slice())]);
    let export_line = harness.server.put_archive(EXPORT_ARCHIVE, export_zip);
    let mention_line = harness.server.put_archive(MENTION_ARCHIVE, mention_zip);
    harness
        .server
        .set_manifest(&format!("{}\n{}\n", export_line, mention_line));

    let first = harness.coordinator.tick().await.expect("first tick");
    assert_eq!(first.succeeded, 2);
    assert!(wait_until(|| harness.publisher.sends().len() >= 2, 5).await);

    let hits_before = harness.server.archive_hits();
    let uploads_before = harness.object_store.uploads().len();
    let sends_before = harness.publisher.sends().len();

    let second = harness.coordinator.tick().await.expect("second tick");

    assert_eq!(second.selected, 0, "nothing should be selected on repeat");
    assert_eq!(second.succeeded, 0);
    assert_eq!(
        harness.server.archive_hits(),
        hits_before,
        "an unchanged archive must not be downloaded again"
    );
    assert_eq!(harness.object_store.uploads().len(), uploads_before);
    assert_eq!(harness.publisher.sends().len(), sends_before);
}

#[tokio::test]
async fn test_integrity_failure_isolates_siblings() {
    init_tracing();
    let harness = TestHarness::start().await;

    let export_zip = build_zip(&[(EXPORT_MEMBER, b"event rows".as_slice())]);
    let mention_zip = build_zip(&[(MENTION_MEMBER, b"mention rows".as_slice())]);
    let mention_hash = md5_hex_of(&mention_zip);

    let export_len = export_zip.len();
    harness.server.put_archive(EXPORT_ARCHIVE, export_zip);
    let mention_line = harness.server.put_archive(MENTION_ARCHIVE, mention_zip);
    let bad_export_line = format!(
        "{} {} {}",
        export_len,
        "9".repeat(32),
        harness.server.archive_url(EXPORT_ARCHIVE)
    );
    harness
        .server
        .set_manifest(&format!("{}\n{}\n", bad_export_line, mention_line));

    let summary = harness.coordinator.tick().await.expect("tick");

    assert_eq!(summary.selected, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let hashes = harness.hash_store.snapshot();
    assert!(
        !hashes.contains_key(EXPORT_ARCHIVE),
        "a hash must never commit for an archive that failed verification"
    );
    assert_eq!(hashes.get(MENTION_ARCHIVE), Some(&mention_hash));

    assert_eq!(
        harness.object_store.object_names(),
        vec![MENTION_MEMBER.to_string()],
        "only the intact sibling's member may be uploaded"
    );

    assert!(
        harness.download_dir_subdirs().is_empty(),
        "scratch directories must be cleaned up on the failure path too"
    );
    assert_eq!(
        harness.download_dir_files(),
        vec![EXPORT_ARCHIVE.to_string()],
        "only the failed download remains in the scratch area"
    );
}

#[tokio::test]
async fn test_zip_slip_archive_is_rejected() {
    init_tracing();
    let harness = TestHarness::start().await;

    let evil_zip = build_zip(&[
        ("innocent.csv", b"rows".as_slice()),
        ("../../etc/passwd", b"root:x:0:0".as_slice()),
    ]);
    let line = harness.server.put_archive(EXPORT_ARCHIVE, evil_zip);
    harness.server.set_manifest(&format!("{}\n", line));

    let summary = harness.coordinator.tick().await.expect("tick");

    assert_eq!(summary.selected, 1);
    assert_eq!(summary.failed, 1);

    assert!(harness.object_store.object_names().is_empty(), "no uploads");
    assert!(harness.status_store.snapshot().is_empty(), "no event handling");
    assert!(harness.publisher.sends().is_empty(), "no publishes");
    assert!(harness.hash_store.snapshot().is_empty(), "no hash commit");

    assert!(
        harness.download_dir_subdirs().is_empty(),
        "scratch directory must be removed"
    );
    assert_eq!(
        harness.download_dir_files(),
        vec![EXPORT_ARCHIVE.to_string()],
        "nothing besides the downloaded archive may be materialized"
    );
}

#[tokio::test]
async fn test_unsupported_archive_types_are_filtered() {
    init_tracing();
    let harness = TestHarness::start().await;

    let export_zip = build_zip(&[(EXPORT_MEMBER, b"event rows".as_slice())]);
    let unsupported_zip = build_zip(&[("other.csv", b"rows".as_slice())]);
    let export_line = harness.server.put_archive(EXPORT_ARCHIVE, export_zip);
    let unsupported_line = harness
        .server
        .put_archive("20250323151500.unsupported.zip", unsupported_zip);
    harness
        .server
        .set_manifest(&format!("{}\n{}\n", export_line, unsupported_line));

    let summary = harness.coordinator.tick().await.expect("tick");

    assert_eq!(summary.parsed, 2);
    assert_eq!(summary.selected, 1, "only the export archive is supported");
    assert_eq!(summary.succeeded, 1);
    assert!(harness.server.hits_for(EXPORT_ARCHIVE) >= 1);
    assert_eq!(
        harness.server.hits_for("20250323151500.unsupported.zip"),
        0,
        "the unsupported archive must not be fetched"
    );
}

#[tokio::test]
async fn test_empty_archive_commits_with_no_uploads() {
    init_tracing();
    let harness = TestHarness::start().await;

    let empty_zip = build_zip(&[]);
    let hash = md5_hex_of(&empty_zip);
    let line = harness.server.put_archive(EXPORT_ARCHIVE, empty_zip);
    harness.server.set_manifest(&format!("{}\n", line));

    let summary = harness.coordinator.tick().await.expect("tick");

    assert_eq!(summary.succeeded, 1);
    assert_eq!(
        harness.hash_store.snapshot().get(EXPORT_ARCHIVE),
        Some(&hash),
        "an empty archive still commits its hash"
    );
    assert!(harness.object_store.object_names().is_empty());
    assert!(harness.publisher.sends().is_empty());
}

#[tokio::test]
async fn test_upload_failure_rolls_back_prior_uploads() {
    init_tracing();
    let harness = TestHarness::start().await;

    let archive = build_zip(&[
        ("first.csv", b"one".as_slice()),
        ("second.csv", b"two".as_slice()),
    ]);
    let line = harness.server.put_archive(EXPORT_ARCHIVE, archive);
    harness.server.set_manifest(&format!("{}\n", line));
    harness.object_store.fail_upload_of("second.csv");

    let summary = harness.coordinator.tick().await.expect("tick");

    assert_eq!(summary.failed, 1);
    assert_eq!(harness.object_store.uploads(), vec!["first.csv".to_string()]);
    assert_eq!(
        harness.object_store.deletes(),
        vec!["first.csv".to_string()],
        "the already uploaded object must be rolled back"
    );
    assert!(harness.object_store.object_names().is_empty());
    assert!(harness.hash_store.snapshot().is_empty(), "no hash commit");
    assert!(harness.publisher.sends().is_empty(), "no event, no publish");
}

#[tokio::test]
async fn test_reprocessing_after_hash_clear_produces_same_objects() {
    init_tracing();
    let harness = TestHarness::start().await;

    let archive = build_zip(&[(EXPORT_MEMBER, b"event rows".as_slice())]);
    let line = harness.server.put_archive(EXPORT_ARCHIVE, archive);
    harness.server.set_manifest(&format!("{}\n", line));

    harness.coordinator.tick().await.expect("first tick");
    let names_before = harness.object_store.object_names();

    // Forcing a reprocess overwrites the same objects: member basenames are
    // stable functions of the archive contents.
    harness.hash_store.clear();
    let summary = harness.coordinator.tick().await.expect("second tick");

    assert_eq!(summary.selected, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(harness.object_store.object_names(), names_before);
    assert_eq!(harness.object_store.uploads().len(), 2);
}

#[tokio::test]
async fn test_manifest_fetch_failure_surfaces() {
    init_tracing();
    let harness = TestHarness::start().await;

    let coordinator = harness.coordinator_for(format!("{}/missing.txt", harness.server.base_url));
    let result = coordinator.tick().await;

    assert!(
        matches!(result, Err(CollectorError::Manifest { .. })),
        "a manifest fetch failure must surface to the caller"
    );
}

#[tokio::test]
async fn test_manifest_with_no_parseable_lines_is_no_error() {
    init_tracing();
    let harness = TestHarness::start().await;

    harness.server.set_manifest("only two\ntokens\n\n");

    let summary = harness.coordinator.tick().await.expect("tick");

    assert_eq!(summary.parsed, 0);
    assert_eq!(summary.malformed_lines, 2);
    assert_eq!(summary.selected, 0);
}
