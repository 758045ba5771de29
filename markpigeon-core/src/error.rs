//! Error taxonomy for the publish pipeline.
//!
//! Session-level failures (auth, provisioning, the privacy gate) abort a
//! publish before any upload begins and surface as [`PublishError`].
//! Per-call failures from the remote store are classified as [`StoreError`]
//! so the executor can decide between backoff, self-healing and giving up.
//! Per-file failures never escape the executor; they are recorded in the
//! outcome map as a [`FailureReason`].

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Credential validation failures. Fatal for the session, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("credential was rejected by the remote store")]
    InvalidCredential,
    #[error("credential lacks write permission for repositories")]
    InsufficientScope,
    #[error("network unavailable while reaching the remote store: {0}")]
    NetworkUnavailable(String),
}

/// Classified failure of a single remote-store call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("rate limited by the remote API")]
    RateLimited { retry_after: Option<Duration> },

    /// The version token no longer matches the remote copy. Never retried
    /// automatically; overwriting a concurrent edit would be incorrect.
    #[error("version token no longer matches the remote copy of {path}")]
    Conflict { path: String },

    /// A create hit a path that already exists. The executor re-reads the
    /// fresh token and retries the action as an update, once.
    #[error("{path} already exists on the remote")]
    AlreadyExists { path: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("remote API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl StoreError {
    /// Whether the backoff-and-retry path applies.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::RateLimited { .. } | StoreError::Network(_)
        )
    }
}

/// Repository provisioning failures. Fatal for the session.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("repository creation was denied: {0}")]
    CreationDenied(String),
    #[error("repository name {0:?} conflicts with an existing repository")]
    NameConflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Session-level publish failure.
///
/// Per-file upload errors are contained in the executor's outcome map and do
/// not appear here.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("privacy warning has not been acknowledged")]
    PrivacyNotAcknowledged,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Reason recorded for a file whose upload permanently failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    RateLimited,
    Conflict,
    Network(String),
    /// Auth or permission refusal observed mid-upload.
    Denied(String),
    Api { status: u16, message: String },
}

impl From<&StoreError> for FailureReason {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::Auth(auth) => FailureReason::Denied(auth.to_string()),
            StoreError::RateLimited { .. } => FailureReason::RateLimited,
            StoreError::Conflict { .. } => FailureReason::Conflict,
            // An unresolvable create/exists race is an optimistic-concurrency
            // surprise like any other.
            StoreError::AlreadyExists { .. } => FailureReason::Conflict,
            StoreError::Network(msg) => FailureReason::Network(msg.clone()),
            StoreError::Api { status, message } => FailureReason::Api {
                status: *status,
                message: message.clone(),
            },
        }
    }
}
