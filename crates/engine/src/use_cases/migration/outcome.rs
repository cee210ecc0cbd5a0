//! Results at each failure granularity.
//!
//! Entity failures are collected and counted; a version failure halts the
//! runner. The two never share a type.

use grimoire_domain::{DocumentId, DocumentLocation, SemVer};

use super::error::MigrationError;

/// A document that could not be migrated.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFailure {
    pub document: DocumentId,
    pub location: DocumentLocation,
    pub reason: String,
}

/// Result of migrating one document.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityMigrationOutcome {
    /// Writes were applied.
    Updated,
    /// The post-condition already held; nothing was written.
    Unchanged,
    Failed(EntityFailure),
}

/// Per-document counts of one migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationTally {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl MigrationTally {
    pub fn record(&mut self, outcome: &EntityMigrationOutcome) {
        match outcome {
            EntityMigrationOutcome::Updated => self.updated += 1,
            EntityMigrationOutcome::Unchanged => self.unchanged += 1,
            EntityMigrationOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: MigrationTally) {
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }

    pub fn visited(&self) -> usize {
        self.updated + self.unchanged + self.failed
    }
}

/// Result of one migration version.
#[derive(Debug)]
pub enum VersionMigrationOutcome {
    Ok(MigrationTally),
    /// The version could not complete; later versions must not run.
    Fatal(MigrationError),
}

impl From<Result<MigrationTally, MigrationError>> for VersionMigrationOutcome {
    fn from(result: Result<MigrationTally, MigrationError>) -> Self {
        match result {
            Ok(tally) => Self::Ok(tally),
            Err(error) => Self::Fatal(error),
        }
    }
}

/// Result of one `run_migrations` invocation.
#[derive(Debug)]
pub enum MigrationRun {
    /// Another process coordinates migrations.
    NotLeader,
    /// The stored marker is already at or past the running version.
    UpToDate { current: SemVer },
    /// No migration between the marker and the running version; the marker
    /// was moved forward directly.
    Advanced { from: SemVer, to: SemVer },
    Completed {
        applied: Vec<SemVer>,
        tally: MigrationTally,
    },
    /// Stopped at `failed`; the marker stays at the last applied version.
    Halted {
        applied: Vec<SemVer>,
        tally: MigrationTally,
        failed: SemVer,
        error: MigrationError,
    },
}

impl MigrationRun {
    /// Whether every pending migration succeeded.
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Halted { .. })
    }

    pub fn applied(&self) -> &[SemVer] {
        match self {
            Self::Completed { applied, .. } | Self::Halted { applied, .. } => applied,
            _ => &[],
        }
    }
}
