#![doc = "GitHub integration for CLI and core: bridges the remote-store trait abstraction to the actual REST API, facilitating publishes to GitHub Pages."]
//
//! # GitHub Client (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the
//! remote-store abstraction in [`markpigeon_core::contract`]. It wires up
//! the [`RemoteStore`] trait for real use against the GitHub REST v3 API,
//! and provides the `GitHubClient` used by the CLI for networked publishes.
//!
//! - All transport, serialization and error classification are encapsulated
//!   here; the core only ever sees the structured taxonomy from
//!   [`markpigeon_core::error`].
//! - The bearer token is held privately, presented on each request, and
//!   never logged, persisted or echoed into error values.
//!
//! ## Client Usage
//!
//! - Construct [`GitHubClient`] from the `GITHUB_TOKEN` environment variable
//!   (`new_from_env`), or with an explicit token and API base for tests and
//!   enterprise hosts.
//! - Use trait methods for end-to-end publishing (viewer, get_repository,
//!   write_file, etc.).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use markpigeon_core::contract::{
    Identity, RemoteEntry, RemoteStore, Repository, Visibility, WriteRequest, WrittenFile,
};
use markpigeon_core::error::{AuthError, StoreError};
use markpigeon_core::provision::PagesStatus;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const CLIENT_USER_AGENT: &str = "markpigeon-publisher";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitHubClient {
    http: Client,
    api_base: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Construct against a non-default API base (tests, enterprise hosts).
    pub fn with_api_base(
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let http = Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Construct from the `GITHUB_TOKEN` environment variable, loading a
    /// `.env` file first if one is present.
    pub fn new_from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN must be set in the environment (or a .env file)")?;
        info!(token_set = !token.is_empty(), "Initialized GitHub client from environment");
        Self::new(token).context("failed to construct HTTP client")
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }
}

/// Everything needed to classify a non-success response, captured before the
/// body is consumed.
struct ApiFailure {
    status: u16,
    rate_limited: bool,
    retry_after: Option<Duration>,
    message: String,
}

async fn api_failure(resp: Response) -> ApiFailure {
    let status = resp.status();
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && header_str(&resp, "x-ratelimit-remaining").as_deref() == Some("0"));
    let retry_after = header_str(&resp, "retry-after")
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let message = match resp.json::<Value>().await {
        Ok(body) => body
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => String::from("<no response body>"),
    };
    ApiFailure {
        status: status.as_u16(),
        rate_limited,
        retry_after,
        message,
    }
}

fn header_str(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn classify_failure(failure: ApiFailure) -> StoreError {
    if failure.rate_limited {
        return StoreError::RateLimited {
            retry_after: failure.retry_after,
        };
    }
    match failure.status {
        401 => AuthError::InvalidCredential.into(),
        403 => AuthError::InsufficientScope.into(),
        status => StoreError::Api {
            status,
            message: failure.message,
        },
    }
}

/// Classification for contents writes, where the API signals
/// optimistic-concurrency outcomes through 409/422 message shapes.
fn classify_write_failure(failure: ApiFailure, path: &str) -> StoreError {
    match failure.status {
        409 => StoreError::Conflict {
            path: path.to_string(),
        },
        422 if failure.message.contains("does not match") => StoreError::Conflict {
            path: path.to_string(),
        },
        422 if failure.message.contains("already exists")
            || failure.message.contains("\"sha\"") =>
        {
            StoreError::AlreadyExists {
                path: path.to_string(),
            }
        }
        _ => classify_failure(failure),
    }
}

fn classify_create_repo_failure(failure: ApiFailure, name: &str) -> StoreError {
    if failure.status == 422 && failure.message.contains("already exists") {
        return StoreError::AlreadyExists {
            path: name.to_string(),
        };
    }
    classify_failure(failure)
}

fn map_pages_status(raw: Option<&str>) -> PagesStatus {
    match raw {
        None => PagesStatus::Enabling,
        Some("queued") | Some("building") => PagesStatus::Propagating,
        Some("built") => PagesStatus::Active,
        Some(other) => {
            warn!(status = other, "Unknown pages status, treating as still enabling");
            PagesStatus::Enabling
        }
    }
}

/// The contents API identifies blob versions by git SHA; the same value is
/// both the comparable fingerprint and the overwrite token.
fn entry_from_value(value: &Value) -> Option<RemoteEntry> {
    let path = value.get("path")?.as_str()?;
    let sha = value.get("sha")?.as_str()?;
    Some(RemoteEntry {
        path: path.to_string(),
        fingerprint: sha.to_string(),
        token: sha.to_string(),
    })
}

#[async_trait]
impl RemoteStore for GitHubClient {
    async fn viewer(&self) -> Result<Identity, AuthError> {
        info!("Validating credential against the GitHub API");
        let resp = self
            .request(Method::GET, "/user")
            .send()
            .await
            .map_err(|e| AuthError::NetworkUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            let failure = api_failure(resp).await;
            error!(status = failure.status, "Credential validation failed");
            return Err(match classify_failure(failure) {
                StoreError::Auth(auth) => auth,
                other => AuthError::NetworkUnavailable(other.to_string()),
            });
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AuthError::NetworkUnavailable(e.to_string()))?;
        let login = body
            .get("login")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if login.is_empty() {
            return Err(AuthError::InvalidCredential);
        }
        info!(login = %login, "Credential accepted");
        Ok(Identity { login })
    }

    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, StoreError> {
        debug!(owner, name, "Fetching repository");
        let resp = self
            .send(self.request(Method::GET, &format!("/repos/{owner}/{name}")))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(classify_failure(api_failure(resp).await));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Some(repository_from_value(&body, owner, name)))
    }

    async fn create_repository(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<Repository, StoreError> {
        info!(name, ?visibility, "Creating repository");
        // auto_init so the default branch exists immediately and can serve
        // as the pages source.
        let body = json!({
            "name": name,
            "private": visibility == Visibility::Private,
            "auto_init": true,
        });
        let resp = self
            .send(self.request(Method::POST, "/user/repos").json(&body))
            .await?;
        if !resp.status().is_success() {
            let failure = api_failure(resp).await;
            error!(status = failure.status, name, "Repository creation failed");
            return Err(classify_create_repo_failure(failure, name));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let repo = repository_from_value(&body, "", name);
        info!(repository = %repo.full_name, "Repository created");
        Ok(repo)
    }

    async fn pages_status(&self, owner: &str, name: &str) -> Result<PagesStatus, StoreError> {
        let resp = self
            .send(self.request(Method::GET, &format!("/repos/{owner}/{name}/pages")))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(PagesStatus::Disabled);
        }
        if !resp.status().is_success() {
            return Err(classify_failure(api_failure(resp).await));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let status = map_pages_status(body.get("status").and_then(|v| v.as_str()));
        debug!(owner, name, pages = ?status, "Observed pages status");
        Ok(status)
    }

    async fn enable_pages(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
    ) -> Result<PagesStatus, StoreError> {
        info!(owner, name, branch, "Requesting pages activation");
        let body = json!({ "source": { "branch": branch, "path": "/" } });
        let resp = self
            .send(
                self.request(Method::POST, &format!("/repos/{owner}/{name}/pages"))
                    .json(&body),
            )
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            // Already enabled by a concurrent actor; fall back to observing.
            debug!(owner, name, "Pages already enabled, observing current state");
            return self.pages_status(owner, name).await;
        }
        if !resp.status().is_success() {
            let failure = api_failure(resp).await;
            error!(status = failure.status, "Pages activation request failed");
            return Err(classify_failure(failure));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(map_pages_status(body.get("status").and_then(|v| v.as_str())))
    }

    async fn list_directory(
        &self,
        owner: &str,
        name: &str,
        dir: &str,
    ) -> Result<Vec<RemoteEntry>, StoreError> {
        let path = if dir.is_empty() {
            format!("/repos/{owner}/{name}/contents")
        } else {
            format!("/repos/{owner}/{name}/contents/{dir}")
        };
        let resp = self.send(self.request(Method::GET, &path)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(classify_failure(api_failure(resp).await));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let entries: Vec<RemoteEntry> = body
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter(|v| v.get("type").and_then(|t| t.as_str()) == Some("file"))
            .filter_map(entry_from_value)
            .collect();
        debug!(owner, name, dir, count = entries.len(), "Listed remote directory");
        Ok(entries)
    }

    async fn read_entry(
        &self,
        owner: &str,
        name: &str,
        path: &str,
    ) -> Result<Option<RemoteEntry>, StoreError> {
        let resp = self
            .send(self.request(
                Method::GET,
                &format!("/repos/{owner}/{name}/contents/{path}"),
            ))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(classify_failure(api_failure(resp).await));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        match entry_from_value(&body) {
            Some(entry) => Ok(Some(entry)),
            None => Err(StoreError::Api {
                status: 200,
                message: format!("unexpected contents payload for {path}"),
            }),
        }
    }

    async fn write_file<'a>(
        &self,
        owner: &str,
        name: &str,
        req: WriteRequest<'a>,
    ) -> Result<WrittenFile, StoreError> {
        debug!(
            owner,
            name,
            path = req.path,
            update = req.expected_token.is_some(),
            "Writing file"
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(req.content);
        let mut body = json!({
            "message": req.message,
            "content": encoded,
            "branch": req.branch,
        });
        if let Some(token) = req.expected_token {
            body["sha"] = json!(token);
        }
        let resp = self
            .send(
                self.request(
                    Method::PUT,
                    &format!("/repos/{owner}/{name}/contents/{}", req.path),
                )
                .json(&body),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(classify_write_failure(api_failure(resp).await, req.path));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let token = body
            .get("content")
            .and_then(|c| c.get("sha"))
            .and_then(|s| s.as_str())
            .map(str::to_string)
            .ok_or_else(|| StoreError::Api {
                status: 200,
                message: format!("write response for {} carried no content sha", req.path),
            })?;
        info!(path = req.path, "File written");
        Ok(WrittenFile { token })
    }

    async fn star_repository(&self, owner: &str, name: &str) -> Result<(), StoreError> {
        debug!(owner, name, "Starring repository");
        let resp = self
            .send(
                self.request(Method::PUT, &format!("/user/starred/{owner}/{name}"))
                    .header(header::CONTENT_LENGTH, 0),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(classify_failure(api_failure(resp).await));
        }
        Ok(())
    }
}

fn repository_from_value(body: &Value, owner: &str, name: &str) -> Repository {
    let full_name = body
        .get("full_name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{owner}/{name}"));
    let default_branch = body
        .get("default_branch")
        .and_then(|v| v.as_str())
        .unwrap_or("main")
        .to_string();
    Repository {
        full_name,
        default_branch,
    }
}
