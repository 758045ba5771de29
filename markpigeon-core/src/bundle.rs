//! Local bundle snapshot: the document and its asset files, as produced by
//! the upstream converter.
//!
//! A [`LocalBundle`] is created once per publish invocation and is immutable
//! for the invocation's lifetime. Fingerprints are computed at construction
//! with the same scheme the remote store uses to identify blob versions, so
//! local-vs-remote comparison never needs to download remote content.

use std::fs;
use std::path::Path;

use regex::Regex;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::PublishError;

/// One file in the bundle: repository-relative path, bytes and fingerprint.
#[derive(Debug, Clone)]
pub struct BundleFile {
    pub path: String,
    pub content: Vec<u8>,
    pub fingerprint: String,
}

impl BundleFile {
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        let fingerprint = blob_fingerprint(&content);
        Self {
            path: path.into(),
            content,
            fingerprint,
        }
    }
}

/// Immutable snapshot of what one publish invocation uploads: the primary
/// document plus the ordered set of asset entries beneath its assets
/// directory.
#[derive(Debug, Clone)]
pub struct LocalBundle {
    pub document: BundleFile,
    pub assets: Vec<BundleFile>,
}

impl LocalBundle {
    /// Assemble a bundle from in-memory parts. Assets are sorted by path so
    /// plans are deterministic regardless of input order.
    pub fn from_parts(
        document: (impl Into<String>, Vec<u8>),
        assets: Vec<(String, Vec<u8>)>,
    ) -> Self {
        let mut assets: Vec<BundleFile> = assets
            .into_iter()
            .map(|(path, content)| BundleFile::new(path, content))
            .collect();
        assets.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            document: BundleFile::new(document.0, document.1),
            assets,
        }
    }

    /// Read a bundle from disk: the HTML document plus an optional sibling
    /// assets directory whose files land under `{dir_name}/{file_name}`.
    pub fn from_paths(document: &Path, assets_dir: Option<&Path>) -> Result<Self, PublishError> {
        let doc_name = file_name_utf8(document)?;
        let doc_content = fs::read(document).map_err(|e| {
            PublishError::InvalidInput(format!("failed to read {}: {e}", document.display()))
        })?;

        let mut assets = Vec::new();
        if let Some(dir) = assets_dir {
            let dir_name = file_name_utf8(dir)?;
            let entries = fs::read_dir(dir).map_err(|e| {
                PublishError::InvalidInput(format!(
                    "failed to read assets directory {}: {e}",
                    dir.display()
                ))
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| {
                    PublishError::InvalidInput(format!(
                        "failed to list assets directory {}: {e}",
                        dir.display()
                    ))
                })?;
                let path = entry.path();
                if !path.is_file() {
                    debug!(path = %path.display(), "Skipping non-file entry in assets directory");
                    continue;
                }
                let name = file_name_utf8(&path)?;
                let content = fs::read(&path).map_err(|e| {
                    PublishError::InvalidInput(format!(
                        "failed to read asset {}: {e}",
                        path.display()
                    ))
                })?;
                assets.push((format!("{dir_name}/{name}"), content));
            }
        }

        Ok(Self::from_parts((doc_name, doc_content), assets))
    }

    /// Relative references in the document (`src="./…"` / `href="./…"`) that
    /// have no matching asset entry. The synchronizer does not rewrite links,
    /// so missing entries mean the published page would have broken ones;
    /// surfaced as warnings, never as an error.
    pub fn missing_references(&self) -> Vec<String> {
        let re = Regex::new(r#"(?:src|href)="\./([^"]+)""#).unwrap();
        let text = String::from_utf8_lossy(&self.document.content);
        let mut missing = Vec::new();
        for cap in re.captures_iter(&text) {
            let referenced = &cap[1];
            if !self.assets.iter().any(|a| a.path == referenced)
                && !missing.iter().any(|m| m == referenced)
            {
                missing.push(referenced.to_string());
            }
        }
        missing
    }
}

/// Fingerprint matching the remote store's blob identifiers:
/// `sha1("blob {len}\0" ++ content)`, lowercase hex.
pub fn blob_fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

fn file_name_utf8(path: &Path) -> Result<String, PublishError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| {
            PublishError::InvalidInput(format!(
                "{} has no usable UTF-8 file name",
                path.display()
            ))
        })
}
