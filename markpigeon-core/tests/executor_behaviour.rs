use std::sync::{Arc, Mutex};

use markpigeon_core::bundle::LocalBundle;
use markpigeon_core::cancel::CancelToken;
use markpigeon_core::contract::{
    MockRemoteStore, NoProgress, ProgressEvent, ProgressObserver, RemoteEntry, WrittenFile,
};
use markpigeon_core::error::{FailureReason, StoreError};
use markpigeon_core::executor::{execute, ExecutorConfig, FileOutcome, RepoTarget, SkipReason};
use markpigeon_core::plan::{plan, ActionKind, RemoteIndex};

/// Observer that records every event, for asserting on sequencing.
struct CollectingObserver {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressObserver for CollectingObserver {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn bundle_with_assets(count: usize) -> LocalBundle {
    let assets = (0..count)
        .map(|i| (format!("assets_doc/{i}.png"), format!("asset-{i}").into_bytes()))
        .collect();
    LocalBundle::from_parts(("doc.html", b"<html></html>".to_vec()), assets)
}

fn fast_config() -> ExecutorConfig {
    ExecutorConfig {
        concurrency: 2,
        max_attempts: 4,
        backoff_base_ms: 1,
        backoff_max_ms: 2,
    }
}

fn target() -> RepoTarget<'static> {
    RepoTarget {
        owner: "alice",
        name: "markpigeon-shelf",
        branch: "main",
    }
}

fn written() -> Result<WrittenFile, StoreError> {
    Ok(WrittenFile {
        token: "tok".to_string(),
    })
}

#[tokio::test]
async fn document_uploads_strictly_after_all_assets() {
    let bundle = bundle_with_assets(3);
    let sync_plan = plan(&bundle, &RemoteIndex::new());

    let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = order.clone();
    let mut store = MockRemoteStore::new();
    store.expect_write_file().times(4).returning(move |_, _, req| {
        recorded.lock().unwrap().push(req.path.to_string());
        written()
    });

    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &fast_config(),
        &NoProgress,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(report.uploaded_count(), 4);
    let order = order.lock().unwrap();
    assert_eq!(
        order.last().map(String::as_str),
        Some("doc.html"),
        "document must be the last write, got: {order:?}"
    );
    assert!(
        order[..3].iter().all(|p| p.starts_with("assets_doc/")),
        "all assets must complete before the document, got: {order:?}"
    );
}

#[tokio::test]
async fn failed_asset_withholds_the_document() {
    let bundle = bundle_with_assets(2);
    let sync_plan = plan(&bundle, &RemoteIndex::new());

    let writes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = writes.clone();
    let mut store = MockRemoteStore::new();
    store.expect_write_file().returning(move |_, _, req| {
        recorded.lock().unwrap().push(req.path.to_string());
        if req.path == "assets_doc/0.png" {
            Err(StoreError::Conflict {
                path: req.path.to_string(),
            })
        } else {
            written()
        }
    });

    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &fast_config(),
        &NoProgress,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(
        report.outcomes["assets_doc/0.png"],
        FileOutcome::Failed(FailureReason::Conflict)
    );
    assert_eq!(report.outcomes["assets_doc/1.png"], FileOutcome::Uploaded);
    assert_eq!(
        report.outcomes["doc.html"],
        FileOutcome::Skipped(SkipReason::DependencyFailure)
    );
    assert!(
        !writes.lock().unwrap().iter().any(|p| p == "doc.html"),
        "document must never be written over a broken asset set"
    );
}

#[tokio::test]
async fn conflict_is_surfaced_without_retry() {
    let bundle = bundle_with_assets(1);
    let mut remote = RemoteIndex::new();
    remote.insert(
        "assets_doc/0.png".to_string(),
        RemoteEntry {
            path: "assets_doc/0.png".to_string(),
            fingerprint: "stale-fingerprint".to_string(),
            token: "tok-stale".to_string(),
        },
    );
    let sync_plan = plan(&bundle, &remote);
    assert!(matches!(
        sync_plan.assets[0].kind,
        ActionKind::Update { .. }
    ));

    let attempts = Arc::new(Mutex::new(0u32));
    let counter = attempts.clone();
    let mut store = MockRemoteStore::new();
    store.expect_write_file().returning(move |_, _, req| {
        *counter.lock().unwrap() += 1;
        assert_eq!(req.expected_token, Some("tok-stale"));
        Err(StoreError::Conflict {
            path: req.path.to_string(),
        })
    });

    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &fast_config(),
        &NoProgress,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(
        *attempts.lock().unwrap(),
        1,
        "a version-token mismatch must not be retried"
    );
    assert_eq!(
        report.outcomes["assets_doc/0.png"],
        FileOutcome::Failed(FailureReason::Conflict)
    );
}

#[tokio::test]
async fn transient_failures_back_off_and_retry() {
    let bundle = bundle_with_assets(1);
    let sync_plan = plan(&bundle, &RemoteIndex::new());

    let attempts = Arc::new(Mutex::new(0u32));
    let counter = attempts.clone();
    let mut store = MockRemoteStore::new();
    store.expect_write_file().returning(move |_, _, req| {
        let mut attempts = counter.lock().unwrap();
        *attempts += 1;
        if *attempts < 3 && req.path == "assets_doc/0.png" {
            Err(StoreError::RateLimited { retry_after: None })
        } else {
            written()
        }
    });

    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &fast_config(),
        &NoProgress,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(report.outcomes["assets_doc/0.png"], FileOutcome::Uploaded);
    assert_eq!(report.outcomes["doc.html"], FileOutcome::Uploaded);
    assert_eq!(*attempts.lock().unwrap(), 4, "two retries plus the document");
}

#[tokio::test]
async fn exhausted_retries_record_the_transient_reason() {
    let bundle = bundle_with_assets(1);
    let sync_plan = plan(&bundle, &RemoteIndex::new());

    let mut store = MockRemoteStore::new();
    store
        .expect_write_file()
        .times(2)
        .withf(|_, _, req| req.path == "assets_doc/0.png")
        .returning(|_, _, _| Err(StoreError::Network("connection reset".to_string())));

    let config = ExecutorConfig {
        max_attempts: 2,
        ..fast_config()
    };
    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &config,
        &NoProgress,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(
        report.outcomes["assets_doc/0.png"],
        FileOutcome::Failed(FailureReason::Network("connection reset".to_string()))
    );
    assert!(report.any_failed());
}

#[tokio::test]
async fn raced_create_self_heals_as_update() {
    let bundle = bundle_with_assets(1);
    let sync_plan = plan(&bundle, &RemoteIndex::new());
    assert_eq!(sync_plan.assets[0].kind, ActionKind::Create);

    let tokens: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = tokens.clone();
    let mut store = MockRemoteStore::new();
    store.expect_write_file().returning(move |_, _, req| {
        recorded
            .lock()
            .unwrap()
            .push(req.expected_token.map(str::to_string));
        if req.expected_token.is_none() && req.path == "assets_doc/0.png" {
            Err(StoreError::AlreadyExists {
                path: req.path.to_string(),
            })
        } else {
            written()
        }
    });
    store.expect_read_entry().times(1).returning(|_, _, path| {
        Ok(Some(RemoteEntry {
            path: path.to_string(),
            fingerprint: "remote-fingerprint".to_string(),
            token: "fresh-tok".to_string(),
        }))
    });

    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &fast_config(),
        &NoProgress,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(report.outcomes["assets_doc/0.png"], FileOutcome::Uploaded);
    let tokens = tokens.lock().unwrap();
    assert_eq!(
        tokens.as_slice(),
        &[
            None,
            Some("fresh-tok".to_string()),
            // The document's own create.
            None
        ],
        "the raced create must retry exactly once with the fresh token"
    );
}

#[tokio::test]
async fn cancellation_stops_dispatch_and_marks_the_rest_cancelled() {
    let bundle = bundle_with_assets(3);
    let sync_plan = plan(&bundle, &RemoteIndex::new());

    let cancel = CancelToken::new();
    let handle = cancel.clone();
    let mut store = MockRemoteStore::new();
    // The first write cancels the publish mid-flight and still succeeds:
    // in-flight transfers run to completion.
    store.expect_write_file().times(1).returning(move |_, _, _| {
        handle.cancel();
        written()
    });

    let config = ExecutorConfig {
        concurrency: 1,
        ..fast_config()
    };
    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &config,
        &NoProgress,
        &cancel,
    )
    .await;

    let uploaded = report
        .outcomes
        .values()
        .filter(|o| **o == FileOutcome::Uploaded)
        .count();
    let cancelled = report
        .outcomes
        .values()
        .filter(|o| **o == FileOutcome::Cancelled)
        .count();
    assert_eq!(uploaded, 1, "exactly the in-flight transfer completes");
    assert_eq!(cancelled, 3, "undispatched assets and the document");
    assert_eq!(report.outcomes["doc.html"], FileOutcome::Cancelled);
}

#[tokio::test]
async fn progress_events_describe_remote_work_only() {
    let bundle = bundle_with_assets(2);
    // One asset is already up to date: it must stay silent.
    let mut remote = RemoteIndex::new();
    remote.insert(
        "assets_doc/1.png".to_string(),
        RemoteEntry {
            path: "assets_doc/1.png".to_string(),
            fingerprint: bundle.assets[1].fingerprint.clone(),
            token: "tok-1".to_string(),
        },
    );
    let sync_plan = plan(&bundle, &remote);

    let mut store = MockRemoteStore::new();
    store.expect_write_file().returning(|_, _, req| {
        if req.path == "assets_doc/0.png" {
            Err(StoreError::Conflict {
                path: req.path.to_string(),
            })
        } else {
            written()
        }
    });

    let events = Arc::new(Mutex::new(Vec::new()));
    let observer = CollectingObserver {
        events: events.clone(),
    };
    let report = execute(
        &store,
        &target(),
        &bundle,
        &sync_plan,
        &fast_config(),
        &observer,
        &CancelToken::new(),
    )
    .await;

    assert_eq!(
        report.outcomes["doc.html"],
        FileOutcome::Skipped(SkipReason::DependencyFailure)
    );

    let events = events.lock().unwrap();
    assert!(
        events.iter().all(|e| e.path() != "assets_doc/1.png"),
        "skipped files must not emit events, got: {events:?}"
    );
    assert!(
        events.iter().all(|e| e.path() != "doc.html"),
        "a withheld document must not emit events, got: {events:?}"
    );
    assert!(events.contains(&ProgressEvent::FileStarted {
        path: "assets_doc/0.png".to_string()
    }));
    assert!(events.contains(&ProgressEvent::FileFailed {
        path: "assets_doc/0.png".to_string(),
        reason: FailureReason::Conflict
    }));
}
