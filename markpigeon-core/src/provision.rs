//! Repository provisioning: ensure the target repository exists and drive
//! the pages feature through its activation states.
//!
//! Activation is an asynchronous remote-side process; [`provision`] issues
//! the enable request and returns immediately with the observed state.
//! Confirmation is the caller's opt-in via [`wait_for_pages`].

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::contract::{Identity, RemoteStore, Visibility};
use crate::error::{ProvisionError, StoreError};

/// Activation state of the pages feature.
///
/// Ordered so that observed transitions can be kept monotonic within one
/// publish session; the remote state may still change out-of-band between
/// sessions, so it is re-checked fresh each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PagesStatus {
    Disabled,
    Enabling,
    Propagating,
    Active,
}

/// What to provision. Visibility defaults to public at the config layer and
/// is only applied when this session creates the repository; an existing
/// repository's visibility is caller-owned and never altered.
#[derive(Debug, Clone)]
pub struct RepoSpec {
    pub name: String,
    pub visibility: Visibility,
}

/// Provisioning outcome observed for this session.
#[derive(Debug, Clone)]
pub struct RepositoryState {
    pub full_name: String,
    pub default_branch: String,
    /// Whether this session created the repository.
    pub created: bool,
    pub pages: PagesStatus,
}

/// Ensure the repository exists and pages activation has been requested.
///
/// Idempotent: calling twice in sequence neither errors nor creates a
/// duplicate repository or a duplicate enable request.
pub async fn provision(
    store: &dyn RemoteStore,
    identity: &Identity,
    spec: &RepoSpec,
) -> Result<RepositoryState, ProvisionError> {
    let (repo, created) = match store.get_repository(&identity.login, &spec.name).await? {
        Some(repo) => {
            info!(repository = %repo.full_name, "Using existing repository");
            (repo, false)
        }
        None => {
            info!(name = %spec.name, visibility = ?spec.visibility, "Creating repository");
            let repo = store
                .create_repository(&spec.name, spec.visibility)
                .await
                .map_err(|e| match e {
                    StoreError::AlreadyExists { .. } => {
                        ProvisionError::NameConflict(spec.name.clone())
                    }
                    StoreError::Auth(auth) => ProvisionError::CreationDenied(auth.to_string()),
                    StoreError::Api { status, message } if status == 403 || status == 422 => {
                        ProvisionError::CreationDenied(message)
                    }
                    other => ProvisionError::Store(other),
                })?;
            info!(repository = %repo.full_name, "Repository created");
            (repo, true)
        }
    };

    let pages = match store.pages_status(&identity.login, &spec.name).await? {
        PagesStatus::Disabled => {
            info!(
                repository = %repo.full_name,
                branch = %repo.default_branch,
                "Requesting pages activation"
            );
            store
                .enable_pages(&identity.login, &spec.name, &repo.default_branch)
                .await?
        }
        state => {
            info!(repository = %repo.full_name, pages = ?state, "Pages feature already enabled");
            state
        }
    };

    Ok(RepositoryState {
        full_name: repo.full_name,
        default_branch: repo.default_branch,
        created,
        pages,
    })
}

/// Poll the pages state until it reports `Active`, the token is cancelled,
/// or a store call fails. Opt-in; the publish itself never blocks on this.
///
/// Observed regressions are not propagated: within a session the reported
/// state only moves forward.
pub async fn wait_for_pages(
    store: &dyn RemoteStore,
    owner: &str,
    name: &str,
    mut current: PagesStatus,
    poll_interval: Duration,
    cancel: &CancelToken,
) -> Result<PagesStatus, StoreError> {
    while current != PagesStatus::Active && !cancel.is_cancelled() {
        tokio::time::sleep(poll_interval).await;
        if cancel.is_cancelled() {
            break;
        }
        let observed = store.pages_status(owner, name).await?;
        if observed < current {
            warn!(
                observed = ?observed,
                current = ?current,
                "Ignoring out-of-band pages state regression"
            );
            continue;
        }
        current = observed;
    }
    Ok(current)
}
