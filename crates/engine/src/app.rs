//! Application state and composition.

use std::sync::Arc;

use grimoire_domain::SemVer;

use crate::infrastructure::ports::{
    ArchiveRepo, DocumentRepo, LeadershipPort, NotifierPort, SettingsRepo,
};
use crate::use_cases;
use crate::use_cases::migration::{standard_registry, MigrationError, MigrationRunner, Traversal};

/// Main application state.
///
/// Holds all repository ports and use cases.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Container for all repository ports.
pub struct Repositories {
    pub documents: Arc<dyn DocumentRepo>,
    pub archives: Arc<dyn ArchiveRepo>,
    pub settings: Arc<dyn SettingsRepo>,
}

/// Container for all use cases.
pub struct UseCases {
    pub migration: use_cases::MigrationUseCases,
}

impl App {
    /// Create a new App with all dependencies wired up.
    ///
    /// `target` is the schema version of this build; the runner migrates up
    /// to it.
    pub fn new(
        repositories: Repositories,
        leadership: Arc<dyn LeadershipPort>,
        notifier: Arc<dyn NotifierPort>,
        target: SemVer,
    ) -> Result<Self, MigrationError> {
        let traversal = Arc::new(Traversal::new(
            repositories.documents.clone(),
            repositories.archives.clone(),
        ));
        let registry = Arc::new(standard_registry(traversal.clone())?);
        tracing::debug!(
            migrations = registry.len(),
            target = %target,
            "Migration registry ready"
        );

        let runner = Arc::new(MigrationRunner::new(
            registry,
            repositories.settings.clone(),
            leadership,
            notifier,
            target,
        ));

        let use_cases = UseCases {
            migration: use_cases::MigrationUseCases::new(runner, traversal),
        };

        Ok(Self {
            repositories,
            use_cases,
        })
    }
}
