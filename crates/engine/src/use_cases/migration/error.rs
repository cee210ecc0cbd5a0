//! Migration errors.

use grimoire_domain::{SemVer, SemVerParseError};

use crate::infrastructure::ports::RepoError;

/// Errors that stop a migration version or the runner itself.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Stored migration marker '{value}' is not a version: {source}")]
    InvalidMarker {
        value: String,
        source: SemVerParseError,
    },
    #[error("Migration {0} is registered twice")]
    DuplicateVersion(SemVer),
    #[error("Migration failed: {0}")]
    Failed(String),
}

impl MigrationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
