use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::Visibility;
use crate::executor::ExecutorConfig;

/// Repository name used when the caller does not configure one.
pub const DEFAULT_REPOSITORY: &str = "markpigeon-shelf";

/// Session configuration, passed explicitly into each publish call rather
/// than read from ambient state. The credential itself never lives here; it
/// belongs to the remote-store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_repository")]
    pub repository: String,
    /// Expected account; mismatches against the authenticated identity are
    /// surfaced as warnings, and the authenticated identity wins.
    #[serde(default)]
    pub owner: Option<String>,
    /// Applied only when this session creates the repository.
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    /// The publish refuses to start until the user has acknowledged that the
    /// published content becomes publicly reachable.
    #[serde(default)]
    pub privacy_acknowledged: bool,
    #[serde(default, flatten)]
    pub executor: ExecutorConfig,
}

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

fn default_visibility() -> Visibility {
    Visibility::Public
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            owner: None,
            visibility: default_visibility(),
            privacy_acknowledged: false,
            executor: ExecutorConfig::default(),
        }
    }
}

impl PublishConfig {
    pub fn trace_loaded(&self) {
        info!(
            repository = %self.repository,
            visibility = ?self.visibility,
            privacy_acknowledged = self.privacy_acknowledged,
            concurrency = self.executor.concurrency,
            "Loaded publish configuration"
        );
        debug!(?self, "Publish configuration (full debug)");
    }
}
