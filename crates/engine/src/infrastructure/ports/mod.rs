//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Document and archive storage (could swap SQLite -> host database)
//! - Settings (the schema version marker lives here)
//! - Leadership, notifications and the clock (host environment, and for testing)

mod error;
mod repos;
mod host;
mod types;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{ArchiveRepo, DocumentRepo, SettingsRepo};

// =============================================================================
// Port Data Types
// =============================================================================
pub use types::{ArchiveInfo, InvalidDocument, Materialized, Notification, NotificationLevel};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{MockArchiveRepo, MockDocumentRepo, MockSettingsRepo};

#[cfg(test)]
pub use host::{MockLeadershipPort, MockNotifierPort};

// =============================================================================
// Host Ports
// =============================================================================
pub use host::{ClockPort, LeadershipPort, NotifierPort};

// =============================================================================
// Error Types
// =============================================================================
pub use error::RepoError;
