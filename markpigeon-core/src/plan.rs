//! Diff engine: compares the local bundle against the remote file index and
//! produces the ordered sync plan.
//!
//! Decisions come purely from fingerprint comparison; unchanged files cost
//! zero extra round trips. Local-only remote files never trigger deletion —
//! stale remote content is left untouched.

use std::collections::BTreeMap;

use tracing::debug;

use crate::bundle::{BundleFile, LocalBundle};
use crate::contract::RemoteEntry;

/// Mapping from repository-relative path to the remote fingerprint and
/// overwrite token. May be stale if another actor mutates the repository
/// concurrently; that surfaces as a conflict at write time, never as a
/// silent overwrite.
pub type RemoteIndex = BTreeMap<String, RemoteEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    /// Carries the remote version token to satisfy the store's
    /// optimistic-concurrency write semantics.
    Update { expected_token: String },
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAction {
    pub path: String,
    pub kind: ActionKind,
}

/// Per-file actions for one publish, discarded after execution.
///
/// Asset actions always execute before the document action: the document's
/// relative links assume its assets are already reachable.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub assets: Vec<FileAction>,
    pub document: FileAction,
}

impl SyncPlan {
    /// Total number of planned actions, skips included.
    pub fn total_actions(&self) -> usize {
        self.assets.len() + 1
    }

    /// Number of actions that will touch the remote.
    pub fn changed_count(&self) -> usize {
        self.assets
            .iter()
            .chain(std::iter::once(&self.document))
            .filter(|a| a.kind != ActionKind::Skip)
            .count()
    }

    pub fn is_noop(&self) -> bool {
        self.changed_count() == 0
    }
}

/// Compute the sync plan for `local` against the remote index.
pub fn plan(local: &LocalBundle, remote: &RemoteIndex) -> SyncPlan {
    let plan = SyncPlan {
        assets: local
            .assets
            .iter()
            .map(|file| action_for(file, remote))
            .collect(),
        document: action_for(&local.document, remote),
    };
    debug!(
        total = plan.total_actions(),
        changed = plan.changed_count(),
        "Computed sync plan"
    );
    plan
}

fn action_for(file: &BundleFile, remote: &RemoteIndex) -> FileAction {
    let kind = match remote.get(&file.path) {
        None => ActionKind::Create,
        Some(entry) if entry.fingerprint == file.fingerprint => ActionKind::Skip,
        Some(entry) => ActionKind::Update {
            expected_token: entry.token.clone(),
        },
    };
    FileAction {
        path: file.path.clone(),
        kind,
    }
}
