//! # contract: capability interface for the remote static-hosting store
//!
//! This module defines the traits and plain-data types the publish pipeline
//! is written against. The remote store's object model (repositories, file
//! blobs, the pages feature) is exposed abstractly here; any concrete host —
//! the GitHub REST client in the `markpigeon` binary crate, or a mock in
//! tests — implements this capability set.
//!
//! ## Interface & Extensibility
//! - Implement [`RemoteStore`] to target a new hosting provider.
//! - All methods are async and return the structured error taxonomy from
//!   [`crate::error`]; raw transport faults never cross this boundary.
//! - Implement [`ProgressObserver`] to receive per-file events while a sync
//!   plan executes (e.g. for a UI progress indicator).
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`, so consumers can generate
//!   deterministic mocks for unit and integration tests.

use async_trait::async_trait;

use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, FailureReason, StoreError};
use crate::provision::PagesStatus;

/// Authenticated account identity, as reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub login: String,
}

/// Visibility requested for a newly created repository.
///
/// Defaults to public at the call sites: private repositories on most hosts
/// cannot serve the pages feature without a paid tier. The default is always
/// overridable by the caller, never silently forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// A repository as seen by the remote store.
#[derive(Debug, Clone)]
pub struct Repository {
    /// Owner-qualified name, e.g. `alice/markpigeon-shelf`.
    pub full_name: String,
    /// Branch the pages feature will serve from.
    pub default_branch: String,
}

/// Content fingerprint and overwrite token for one remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Repository-relative path.
    pub path: String,
    /// Deterministic content hash, comparable against a locally computed
    /// fingerprint without downloading the content.
    pub fingerprint: String,
    /// Opaque token the store requires to authorise an overwrite.
    pub token: String,
}

/// A single optimistic-concurrency file write.
pub struct WriteRequest<'a> {
    /// Repository-relative destination path.
    pub path: &'a str,
    /// Raw file bytes; encoding for the wire is the implementor's concern.
    pub content: &'a [u8],
    /// Commit message recorded by the store.
    pub message: &'a str,
    /// Branch to write to.
    pub branch: &'a str,
    /// Token of the version being overwritten. `None` creates the file; the
    /// store must reject a create when the path already exists.
    pub expected_token: Option<&'a str>,
}

/// Token of the file version a successful write produced.
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub token: String,
}

/// Capability set the publish pipeline needs from a static-hosting store.
///
/// The trait is `Send + Sync` and intended for async/await usage. It is
/// implemented by real clients and by test mocks. There is deliberately no
/// delete operation: stale remote files are left untouched.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// One lightweight authenticated call proving the credential is usable.
    ///
    /// Must not retry; a single definitive check gates all subsequent work.
    async fn viewer(&self) -> Result<Identity, AuthError>;

    /// Fetch a repository owned by `owner`, or `None` when absent.
    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, StoreError>;

    /// Create a repository under the authenticated account, initialised so a
    /// default branch exists immediately.
    async fn create_repository(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<Repository, StoreError>;

    /// Observe the pages activation state for a repository.
    async fn pages_status(&self, owner: &str, name: &str) -> Result<PagesStatus, StoreError>;

    /// Request pages activation with the source set to `branch` at root.
    ///
    /// Returns the state observed in the response; activation itself
    /// propagates asynchronously on the remote side.
    async fn enable_pages(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
    ) -> Result<PagesStatus, StoreError>;

    /// List the file entries directly under `dir` (`""` for the repository
    /// root). A directory that does not exist yet yields an empty list.
    async fn list_directory(
        &self,
        owner: &str,
        name: &str,
        dir: &str,
    ) -> Result<Vec<RemoteEntry>, StoreError>;

    /// Fetch the current entry for a single path, or `None` when absent.
    async fn read_entry(
        &self,
        owner: &str,
        name: &str,
        path: &str,
    ) -> Result<Option<RemoteEntry>, StoreError>;

    /// Write one file under optimistic concurrency, per [`WriteRequest`].
    async fn write_file<'a>(
        &self,
        owner: &str,
        name: &str,
        req: WriteRequest<'a>,
    ) -> Result<WrittenFile, StoreError>;

    /// Star a repository on behalf of the authenticated account.
    /// Best-effort; errors are the caller's to ignore.
    async fn star_repository(&self, owner: &str, name: &str) -> Result<(), StoreError>;
}

/// Progress notification delivered while a sync plan executes.
///
/// Events describe remote work only: planned `Skip` actions settle without
/// emitting anything, so an idempotent republish is silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    FileStarted { path: String },
    FileCompleted { path: String },
    FileFailed { path: String, reason: FailureReason },
}

impl ProgressEvent {
    pub fn path(&self) -> &str {
        match self {
            ProgressEvent::FileStarted { path }
            | ProgressEvent::FileCompleted { path }
            | ProgressEvent::FileFailed { path, .. } => path,
        }
    }
}

/// Observer for [`ProgressEvent`]s; the publish operation runs on a
/// background execution path and communicates progress through this rather
/// than return-value polling.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Observer that drops every event.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}
