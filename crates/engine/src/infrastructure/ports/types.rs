//! Data carried across port boundaries.

use std::fmt;

use grimoire_domain::{ArchiveId, Document, DocumentId, DocumentKind, DocumentLocation, SchemaError};

/// A stored row that could not be materialized.
///
/// Returned next to the valid documents of a listing so one corrupt row
/// does not hide the rest of the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidDocument {
    pub id: DocumentId,
    pub location: DocumentLocation,
    pub error: SchemaError,
}

/// Outcome of loading one stored row.
pub type Materialized = Result<Document, InvalidDocument>;

/// A distributable archive of documents of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub id: ArchiveId,
    pub label: String,
    pub kind: DocumentKind,
    /// Locked archives reject writes.
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// User-facing message raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}
