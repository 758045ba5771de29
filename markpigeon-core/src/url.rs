//! Public URL construction for published documents.

use crate::error::PublishError;

/// Build the public pages URL for a published document:
/// `https://{owner}.github.io/{repo}/{document_path}`.
///
/// Pure string construction; no network access. The only failure mode is
/// malformed-input rejection.
pub fn page_url(owner: &str, repo: &str, document_path: &str) -> Result<String, PublishError> {
    if owner.is_empty() || owner.contains('/') || owner.contains(char::is_whitespace) {
        return Err(PublishError::InvalidInput(format!(
            "owner {owner:?} is not a valid account name"
        )));
    }
    if repo.is_empty() || repo.contains('/') || repo.contains(char::is_whitespace) {
        return Err(PublishError::InvalidInput(format!(
            "repository name {repo:?} is not valid"
        )));
    }
    let normalized = document_path.trim_start_matches("./");
    if normalized.is_empty()
        || normalized.starts_with('/')
        || normalized.contains('\\')
        || normalized.split('/').any(|segment| segment == "..")
    {
        return Err(PublishError::InvalidInput(format!(
            "document path {document_path:?} is not repository-relative"
        )));
    }
    Ok(format!("https://{owner}.github.io/{repo}/{normalized}"))
}
