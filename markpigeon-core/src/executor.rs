//! Upload executor: applies a sync plan against the remote store.
//!
//! Asset actions run with bounded concurrency; the document action runs
//! strictly after every asset action has reached a terminal state, so a
//! visitor never sees a document whose images are missing. One file's
//! permanent failure does not abort the rest of the plan: the executor
//! drains all actions and records every outcome.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::bundle::LocalBundle;
use crate::cancel::CancelToken;
use crate::contract::{ProgressEvent, ProgressObserver, RemoteStore, WriteRequest};
use crate::error::{FailureReason, StoreError};
use crate::plan::{ActionKind, FileAction, SyncPlan};

/// Knobs for plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum concurrent asset uploads. Kept small so bursts stay under the
    /// remote API's secondary rate limit.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempt cap per action; applies to transient failures only.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_concurrency() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    8_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Terminal outcome for one planned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    Uploaded,
    Skipped(SkipReason),
    Failed(FailureReason),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    UpToDate,
    /// The document was withheld because at least one asset action failed;
    /// publishing it would expose broken links.
    DependencyFailure,
}

/// Where the executor writes.
#[derive(Debug, Clone)]
pub struct RepoTarget<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub branch: &'a str,
}

/// Per-file outcomes of one executed plan.
#[derive(Debug)]
pub struct ExecutionReport {
    pub outcomes: BTreeMap<String, FileOutcome>,
}

impl ExecutionReport {
    pub fn any_failed(&self) -> bool {
        self.outcomes
            .values()
            .any(|o| matches!(o, FileOutcome::Failed(_)))
    }

    pub fn uploaded_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| **o == FileOutcome::Uploaded)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, FileOutcome::Failed(_)))
            .count()
    }
}

/// Execute the plan and drain every action to a terminal outcome.
pub async fn execute(
    store: &dyn RemoteStore,
    target: &RepoTarget<'_>,
    bundle: &LocalBundle,
    plan: &SyncPlan,
    config: &ExecutorConfig,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> ExecutionReport {
    let mut outcomes: BTreeMap<String, FileOutcome> = BTreeMap::new();

    // Skips settle immediately without touching the network.
    let mut pending: Vec<&FileAction> = Vec::new();
    for action in &plan.assets {
        if action.kind == ActionKind::Skip {
            debug!(path = %action.path, "Asset unchanged, skipping");
            outcomes.insert(action.path.clone(), FileOutcome::Skipped(SkipReason::UpToDate));
        } else {
            pending.push(action);
        }
    }

    let concurrency = config.concurrency.max(1);
    let asset_outcomes: Vec<(String, FileOutcome)> = stream::iter(pending.into_iter().map(
        |action| {
            let content = bundle_content(bundle, &action.path);
            async move {
                // Checked when the action is admitted to the worker pool: no
                // new dispatches after cancellation, in-flight ones finish.
                if cancel.is_cancelled() {
                    debug!(path = %action.path, "Not dispatching asset, publish cancelled");
                    return (action.path.clone(), FileOutcome::Cancelled);
                }
                let outcome = run_action(store, target, action, content, config, observer).await;
                (action.path.clone(), outcome)
            }
        },
    ))
    .buffer_unordered(concurrency)
    .collect()
    .await;
    outcomes.extend(asset_outcomes);

    // Document only after all assets are terminal.
    let document = &plan.document;
    let doc_outcome = if document.kind == ActionKind::Skip {
        debug!(path = %document.path, "Document unchanged, skipping");
        FileOutcome::Skipped(SkipReason::UpToDate)
    } else if cancel.is_cancelled() {
        debug!(path = %document.path, "Not dispatching document, publish cancelled");
        FileOutcome::Cancelled
    } else if outcomes
        .values()
        .any(|o| matches!(o, FileOutcome::Failed(_)))
    {
        warn!(
            path = %document.path,
            "Withholding document upload: a partially uploaded asset set would break its links"
        );
        FileOutcome::Skipped(SkipReason::DependencyFailure)
    } else {
        run_action(
            store,
            target,
            document,
            &bundle.document.content,
            config,
            observer,
        )
        .await
    };
    outcomes.insert(document.path.clone(), doc_outcome);

    ExecutionReport { outcomes }
}

async fn run_action(
    store: &dyn RemoteStore,
    target: &RepoTarget<'_>,
    action: &FileAction,
    content: &[u8],
    config: &ExecutorConfig,
    observer: &dyn ProgressObserver,
) -> FileOutcome {
    observer.on_event(ProgressEvent::FileStarted {
        path: action.path.clone(),
    });
    debug!(path = %action.path, kind = ?action.kind, "Dispatching file action");

    let message = commit_message(&action.path);
    let mut backoff = Backoff::new(config.backoff_base_ms, config.backoff_max_ms);
    let mut expected: Option<String> = match &action.kind {
        ActionKind::Update { expected_token } => Some(expected_token.clone()),
        _ => None,
    };
    let mut attempts = 0u32;
    // One self-heal is allowed when a planned create raced an out-of-band
    // write between planning and execution.
    let mut reclassified = false;

    loop {
        attempts += 1;
        let req = WriteRequest {
            path: &action.path,
            content,
            message: &message,
            branch: target.branch,
            expected_token: expected.as_deref(),
        };
        match store.write_file(target.owner, target.name, req).await {
            Ok(written) => {
                info!(path = %action.path, token = %written.token, "Uploaded file");
                observer.on_event(ProgressEvent::FileCompleted {
                    path: action.path.clone(),
                });
                return FileOutcome::Uploaded;
            }
            Err(StoreError::AlreadyExists { .. }) if expected.is_none() && !reclassified => {
                warn!(
                    path = %action.path,
                    "Planned create raced an existing file, refetching version token"
                );
                match store
                    .read_entry(target.owner, target.name, &action.path)
                    .await
                {
                    Ok(Some(entry)) => {
                        reclassified = true;
                        expected = Some(entry.token);
                    }
                    Ok(None) => {
                        // Entry vanished again between the write and the read;
                        // the retried create settles it either way.
                        reclassified = true;
                    }
                    Err(err) => return fail(observer, &action.path, &err),
                }
            }
            Err(err) if err.is_transient() && attempts < config.max_attempts => {
                let mut delay = backoff.next_delay();
                if let StoreError::RateLimited {
                    retry_after: Some(after),
                } = &err
                {
                    delay = delay.max(*after);
                }
                warn!(
                    path = %action.path,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient upload failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return fail(observer, &action.path, &err),
        }
    }
}

fn fail(observer: &dyn ProgressObserver, path: &str, err: &StoreError) -> FileOutcome {
    let reason = FailureReason::from(err);
    error!(path = %path, error = %err, "File action failed permanently");
    observer.on_event(ProgressEvent::FileFailed {
        path: path.to_string(),
        reason: reason.clone(),
    });
    FileOutcome::Failed(reason)
}

fn commit_message(path: &str) -> String {
    format!("Publish {path} via MarkPigeon")
}

fn bundle_content<'a>(bundle: &'a LocalBundle, path: &str) -> &'a [u8] {
    if bundle.document.path == path {
        return &bundle.document.content;
    }
    bundle
        .assets
        .iter()
        .find(|f| f.path == path)
        .map(|f| f.content.as_slice())
        .unwrap_or_default()
}
