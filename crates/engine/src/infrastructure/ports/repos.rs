//! Storage ports.

use async_trait::async_trait;
use grimoire_domain::{ArchiveId, Document, DocumentKind, DocumentLocation, DocumentUpdate};

use super::error::RepoError;
use super::types::{ArchiveInfo, Materialized};

// =============================================================================
// Document Ports
// =============================================================================

/// World-level and owned documents.
///
/// Every listed document has been through the schema normalizer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRepo: Send + Sync {
    /// World-level documents of one kind, in stored order.
    async fn list_world(&self, kind: DocumentKind) -> Result<Vec<Materialized>, RepoError>;

    /// Items embedded in an owning actor. `owner` is a
    /// [`DocumentLocation::Owned`] naming the actor and, for archived actors,
    /// its archive.
    async fn list_owned(&self, owner: &DocumentLocation) -> Result<Vec<Materialized>, RepoError>;

    /// Apply writes to the stored source of a document at its location.
    /// Documents inside a locked archive, including items owned by an
    /// archived actor, are rejected.
    async fn update(&self, document: &Document, update: &DocumentUpdate) -> Result<(), RepoError>;
}

/// Distributable archives. Entries are read-only snapshots; writing them
/// back requires the archive to be unlocked.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveRepo: Send + Sync {
    async fn list_archives(&self) -> Result<Vec<ArchiveInfo>, RepoError>;
    async fn list_entries(&self, archive: &ArchiveId) -> Result<Vec<Materialized>, RepoError>;
    async fn set_locked(&self, archive: &ArchiveId, locked: bool) -> Result<(), RepoError>;
}

// =============================================================================
// Settings Port
// =============================================================================

/// World-scoped string settings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, RepoError>;
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), RepoError>;
}
