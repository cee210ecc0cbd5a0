//! Schema migration use cases.
//!
//! The runner decides which versions are pending and records progress; the
//! traversal applies each version's document migrations wherever documents
//! are stored.

mod error;
mod outcome;
mod registry;
mod runner;
mod traversal;
pub mod versions;

use std::sync::Arc;

pub use error::MigrationError;
pub use outcome::{
    EntityFailure, EntityMigrationOutcome, MigrationRun, MigrationTally, VersionMigrationOutcome,
};
pub use registry::{Migration, MigrationRegistry, RegisteredMigration};
pub use runner::{MigrationRunner, RunnerPhase, MARKER_KEY, MARKER_NAMESPACE};
pub use traversal::{is_migration_candidate, DocumentMigration, Traversal};
pub use versions::{standard_registry, DocumentMigrationStep};

/// Container for migration use cases.
pub struct MigrationUseCases {
    pub runner: Arc<MigrationRunner>,
    pub traversal: Arc<Traversal>,
}

impl MigrationUseCases {
    pub fn new(runner: Arc<MigrationRunner>, traversal: Arc<Traversal>) -> Self {
        Self { runner, traversal }
    }
}
