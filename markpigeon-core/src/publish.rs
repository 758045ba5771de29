//! High-level pipeline: validate → provision → plan → execute for one
//! publish invocation.
//!
//! This module provides the top-level orchestration over an injected
//! [`RemoteStore`]. It gates on the privacy acknowledgment, validates the
//! credential with a single definitive call, ensures the repository and its
//! pages feature are provisioned, fetches the remote index in bulk, computes
//! the sync plan and hands it to the executor, then assembles the
//! [`PublishResult`] returned to the caller.
//!
//! # Error Handling
//! Session-level failures (privacy gate, auth, provisioning, index fetch)
//! abort before any upload begins and surface as [`PublishError`]. Per-file
//! upload failures are contained in the result's outcome map; the publish is
//! *partially failed* when any file failed, and the document is withheld in
//! that case rather than published over missing assets.
//!
//! # Callable From
//! - Used by the CLI crate and integration tests.
//! - Expects a concrete async [`RemoteStore`] implementation.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::bundle::LocalBundle;
use crate::cancel::CancelToken;
use crate::config::PublishConfig;
use crate::contract::{ProgressObserver, RemoteStore};
use crate::error::PublishError;
use crate::executor::{self, FileOutcome, RepoTarget};
use crate::plan::{self, RemoteIndex};
use crate::provision::{provision, PagesStatus, RepoSpec};
use crate::url::page_url;

/// Result of one publish invocation, returned to the caller and not
/// retained by the core beyond the call.
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    /// Publicly reachable URL of the document. Content may still be
    /// propagating when `pages` is not yet `Active`.
    pub public_url: String,
    pub pages: PagesStatus,
    /// Owner-qualified repository name that was published to.
    pub repository: String,
    pub outcomes: BTreeMap<String, FileOutcome>,
    pub warnings: Vec<String>,
}

impl PublishResult {
    pub fn uploaded_files(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| **o == FileOutcome::Uploaded)
            .count()
    }

    pub fn failed_files(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, FileOutcome::Failed(_)))
            .count()
    }

    /// Whether any file permanently failed. The document is withheld in that
    /// case, so the published site was not left with broken links.
    pub fn is_partial_failure(&self) -> bool {
        self.failed_files() > 0
    }

    /// Owner half of the owner-qualified repository name.
    pub fn repository_owner(&self) -> &str {
        self.repository.split('/').next().unwrap_or_default()
    }
}

/// Run one full publish of `bundle` according to `config`.
pub async fn publish(
    store: &dyn RemoteStore,
    config: &PublishConfig,
    bundle: &LocalBundle,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<PublishResult, PublishError> {
    info!(
        repository = %config.repository,
        document = %bundle.document.path,
        assets = bundle.assets.len(),
        "Starting publish"
    );

    if !config.privacy_acknowledged {
        return Err(PublishError::PrivacyNotAcknowledged);
    }

    let mut warnings: Vec<String> = bundle
        .missing_references()
        .into_iter()
        .map(|r| format!("document references {r:?} but the bundle has no such asset"))
        .collect();
    for warning in &warnings {
        warn!(warning = %warning, "Bundle parity warning");
    }

    // Single definitive credential check gating everything below.
    let identity = store.viewer().await?;
    info!(login = %identity.login, "Credential validated");

    if let Some(owner) = &config.owner {
        if owner != &identity.login {
            let warning = format!(
                "configured owner {owner:?} does not match authenticated account {:?}; using the authenticated account",
                identity.login
            );
            warn!(warning = %warning, "Owner mismatch");
            warnings.push(warning);
        }
    }

    let spec = RepoSpec {
        name: config.repository.clone(),
        visibility: config.visibility,
    };
    let state = provision(store, &identity, &spec).await?;
    info!(
        repository = %state.full_name,
        created = state.created,
        pages = ?state.pages,
        "Repository provisioned"
    );

    let public_url = page_url(&identity.login, &config.repository, &bundle.document.path)?;

    let remote = fetch_remote_index(store, &identity.login, &config.repository, bundle).await?;
    let plan = plan::plan(bundle, &remote);
    info!(
        total = plan.total_actions(),
        changed = plan.changed_count(),
        "Sync plan computed"
    );

    let target = RepoTarget {
        owner: &identity.login,
        name: &config.repository,
        branch: &state.default_branch,
    };
    let report = executor::execute(
        store,
        &target,
        bundle,
        &plan,
        &config.executor,
        observer,
        cancel,
    )
    .await;

    if report.any_failed() {
        warn!(
            failed = report.failed_count(),
            "Publish finished with per-file failures"
        );
    } else {
        info!(
            uploaded = report.uploaded_count(),
            url = %public_url,
            "Publish finished"
        );
    }

    Ok(PublishResult {
        public_url,
        pages: state.pages,
        repository: state.full_name,
        outcomes: report.outcomes,
        warnings,
    })
}

/// Fetch the remote fingerprints for every directory the bundle touches: the
/// repository root (for the document) and each assets directory. One listing
/// call per directory; unchanged files are then settled locally.
async fn fetch_remote_index(
    store: &dyn RemoteStore,
    owner: &str,
    name: &str,
    bundle: &LocalBundle,
) -> Result<RemoteIndex, PublishError> {
    let mut dirs: BTreeSet<String> = BTreeSet::new();
    dirs.insert(String::new());
    for asset in &bundle.assets {
        if let Some((dir, _)) = asset.path.rsplit_once('/') {
            dirs.insert(dir.to_string());
        }
    }

    let mut index = RemoteIndex::new();
    for dir in dirs {
        for entry in store.list_directory(owner, name, &dir).await? {
            index.insert(entry.path.clone(), entry);
        }
    }
    info!(entries = index.len(), "Fetched remote index");
    Ok(index)
}
