///
/// This module implements the full CLI interface for markpigeon — command
/// parsing, argument validation, main entrypoints and user-visible
/// invocations.
///
/// All core business logic (bundle model, diff planning, execution) lives in
/// the [`markpigeon-core`] crate. This module is strictly for CLI glue,
/// ergonomic argument exposure, and orchestration.
///
/// ## Features
/// - Entry struct [`Cli`] defines all user-facing options and subcommands.
/// - Subcommand routing (`publish`, `check`) and argument validation.
/// - Async entrypoint (`run`) for programmatic invocation and integration
///   testing.
/// - Logging, tracing, and structured error output at CLI level.
///
/// ## How To Use
/// - For command-line users: use the installed `markpigeon` binary with
///   `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed
///   [`Cli`].
///
/// [`markpigeon-core`]: ../../markpigeon-core/
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use markpigeon_core::bundle::LocalBundle;
use markpigeon_core::cancel::CancelToken;
use markpigeon_core::contract::{ProgressEvent, ProgressObserver, RemoteStore};
use markpigeon_core::provision::{wait_for_pages, PagesStatus};
use markpigeon_core::publish::publish;

use crate::github::GitHubClient;
use crate::load_config::load_config;

/// Upstream project repository, starred as a small thank-you after the first
/// fully successful publish.
const PROJECT_OWNER: &str = "MarkPigeon";
const PROJECT_REPO: &str = "MarkPigeon";

const PAGES_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// CLI for markpigeon: publish converted document bundles to GitHub Pages.
#[derive(Parser)]
#[clap(
    name = "markpigeon",
    version,
    about = "Publish a converted HTML document and its assets to GitHub Pages"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish an HTML document and its sibling assets directory
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the converted HTML document
        #[clap(long)]
        html: PathBuf,
        /// Assets directory; defaults to `assets_{stem}` next to the document
        #[clap(long)]
        assets: Option<PathBuf>,
        /// Poll until the pages site reports itself active before exiting
        #[clap(long)]
        wait_pages: bool,
    },
    /// Validate the configured credential and report the repository state
    Check {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Publish {
            config,
            html,
            assets,
            wait_pages,
        } => publish_command(config, html, assets, wait_pages).await,
        Commands::Check { config } => check_command(config).await,
    }
}

/// Observer mapping executor progress events onto tracing, with a running
/// counter for the original (current, total, message) progress contract.
struct LogObserver {
    total: usize,
    started: AtomicUsize,
}

impl ProgressObserver for LogObserver {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FileStarted { path } => {
                let current = self.started.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(file = %path, current, total = self.total, "Uploading file");
            }
            ProgressEvent::FileCompleted { path } => {
                tracing::info!(file = %path, "Upload complete");
            }
            ProgressEvent::FileFailed { path, reason } => {
                tracing::error!(file = %path, reason = ?reason, "Upload failed");
            }
        }
    }
}

async fn publish_command(
    config_path: PathBuf,
    html: PathBuf,
    assets: Option<PathBuf>,
    wait_pages: bool,
) -> Result<()> {
    let loaded = load_config(&config_path)?;
    loaded.publish.trace_loaded();

    let client = GitHubClient::new_from_env()?;

    let assets_dir = resolve_assets_dir(&html, assets);
    let bundle = LocalBundle::from_paths(&html, assets_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to assemble bundle: {e}"))?;
    tracing::info!(
        document = %bundle.document.path,
        assets = bundle.assets.len(),
        "Bundle assembled"
    );

    let cancel = CancelToken::new();
    let cancel_handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested; in-flight transfers will finish");
            cancel_handle.cancel();
        }
    });

    let observer = LogObserver {
        total: bundle.assets.len() + 1,
        started: AtomicUsize::new(0),
    };
    let result = publish(&client, &loaded.publish, &bundle, &observer, &cancel)
        .await
        .map_err(|e| anyhow::anyhow!("Publish failed: {e}"))?;

    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    println!("Published to: {}", result.public_url);
    let mut pages = result.pages;
    if pages != PagesStatus::Active {
        println!("Note: pages activation is still propagating; the URL may take a minute to go live.");
    }

    if wait_pages && pages != PagesStatus::Active {
        tracing::info!(pages = ?pages, "Waiting for pages activation");
        pages = wait_for_pages(
            &client,
            result.repository_owner(),
            &loaded.publish.repository,
            pages,
            PAGES_POLL_INTERVAL,
            &cancel,
        )
        .await
        .map_err(|e| anyhow::anyhow!("Pages activation poll failed: {e}"))?;
        println!("Pages status: {pages:?}");
    }

    if result.is_partial_failure() {
        anyhow::bail!(
            "Publish partially failed: {} file(s) could not be uploaded; the document was withheld",
            result.failed_files()
        );
    }

    if loaded.star_markpigeon {
        // Best-effort thank-you; never fails the publish.
        match client.star_repository(PROJECT_OWNER, PROJECT_REPO).await {
            Ok(()) => tracing::info!("Starred the MarkPigeon project"),
            Err(e) => tracing::warn!(error = %e, "Could not star the MarkPigeon project"),
        }
    }

    tracing::info!(url = %result.public_url, uploaded = result.uploaded_files(), "Publish complete");
    Ok(())
}

async fn check_command(config_path: PathBuf) -> Result<()> {
    let loaded = load_config(&config_path)?;
    let client = GitHubClient::new_from_env()?;

    let identity = client
        .viewer()
        .await
        .map_err(|e| anyhow::anyhow!("Credential check failed: {e}"))?;
    println!("Authenticated as {}", identity.login);

    match client
        .get_repository(&identity.login, &loaded.publish.repository)
        .await
        .map_err(|e| anyhow::anyhow!("Repository lookup failed: {e}"))?
    {
        Some(repo) => {
            let pages = client
                .pages_status(&identity.login, &loaded.publish.repository)
                .await
                .map_err(|e| anyhow::anyhow!("Pages lookup failed: {e}"))?;
            println!("Repository {} exists (pages: {pages:?})", repo.full_name);
        }
        None => println!(
            "Repository {} will be created on first publish",
            loaded.publish.repository
        ),
    }
    Ok(())
}

fn resolve_assets_dir(html: &Path, assets: Option<PathBuf>) -> Option<PathBuf> {
    if assets.is_some() {
        return assets;
    }
    let stem = html.file_stem()?.to_str()?;
    let candidate = html.parent()?.join(format!("assets_{stem}"));
    candidate.is_dir().then_some(candidate)
}
