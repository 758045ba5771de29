/// `load_config` module: loads a static YAML config file and adapts it into
/// the core's [`PublishConfig`].
///
/// This module is the only place where untrusted YAML is parsed and mapped
/// to rich, strongly-typed internal structs.
///
/// # Responsibilities
/// - Parse user-supplied YAML configuration files into type-safe structs
/// - Ensure robust error messages for CLI and tests: any failure in loading
///   must result in clear diagnostics
/// - Act as the adapter layer decoupling the input schema from the domain
///   core
///
/// The credential is deliberately absent from the schema: the token comes
/// only from the `GITHUB_TOKEN` environment variable (see
/// [`crate::github::GitHubClient::new_from_env`]), so config files stay safe
/// to share.
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich
/// diagnostics, surfaced at the CLI boundary.
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use markpigeon_core::config::PublishConfig;

/// Fully loaded CLI configuration.
#[derive(Debug)]
pub struct LoadedConfig {
    pub publish: PublishConfig,
    /// Star the upstream MarkPigeon repository after a fully successful
    /// publish. On by default, best-effort, never fails the publish.
    pub star_markpigeon: bool,
}

/// Load a YAML config file. Every field has a default, so an empty mapping
/// is a valid (if not yet publishable) configuration.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LoadedConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        #[serde(flatten)]
        publish: PublishConfig,
        #[serde(default = "default_star")]
        star_markpigeon: bool,
    }

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(LoadedConfig {
        publish: raw.publish,
        star_markpigeon: raw.star_markpigeon,
    })
}

fn default_star() -> bool {
    true
}
