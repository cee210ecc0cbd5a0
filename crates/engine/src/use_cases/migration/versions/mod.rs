//! Shipped schema migrations.
//!
//! Each version bundles one or more [`DocumentMigration`]s which are run
//! through the shared [`Traversal`] one after another.

mod legacy_flags;
mod power_augments;
mod power_discipline;

use std::sync::Arc;

use async_trait::async_trait;
use grimoire_domain::SemVer;

use super::error::MigrationError;
use super::outcome::{MigrationTally, VersionMigrationOutcome};
use super::registry::{Migration, MigrationRegistry};
use super::traversal::{DocumentMigration, Traversal};

pub use legacy_flags::{CopyLegacyFlags, DropLegacyFlags};
pub use power_augments::{DropStaleSchool, PersistAugmentRelocation};
pub use power_discipline::RenameSchoolToDiscipline;

/// A version made of document migrations.
pub struct DocumentMigrationStep {
    description: String,
    traversal: Arc<Traversal>,
    migrations: Vec<Arc<dyn DocumentMigration>>,
}

impl DocumentMigrationStep {
    pub fn new(
        description: impl Into<String>,
        traversal: Arc<Traversal>,
        migrations: Vec<Arc<dyn DocumentMigration>>,
    ) -> Self {
        Self {
            description: description.into(),
            traversal,
            migrations,
        }
    }

    async fn run(&self) -> Result<MigrationTally, MigrationError> {
        let mut tally = MigrationTally::default();
        for migration in &self.migrations {
            tally.merge(self.traversal.run(migration.as_ref()).await?);
        }
        Ok(tally)
    }
}

#[async_trait]
impl Migration for DocumentMigrationStep {
    fn description(&self) -> &str {
        &self.description
    }

    async fn migrate(&self) -> VersionMigrationOutcome {
        self.run().await.into()
    }
}

/// Registry holding every migration this build ships.
pub fn standard_registry(traversal: Arc<Traversal>) -> Result<MigrationRegistry, MigrationError> {
    let step = |description: &str, migrations: Vec<Arc<dyn DocumentMigration>>| {
        Arc::new(DocumentMigrationStep::new(
            description,
            traversal.clone(),
            migrations,
        ))
    };

    let mut registry = MigrationRegistry::new();
    registry.register(
        SemVer::new(0, 3, 1),
        step(
            "Copy actor flags out of the legacy namespace",
            vec![Arc::new(CopyLegacyFlags)],
        ),
    )?;
    registry.register(
        SemVer::new(0, 4, 1),
        step(
            "Rename power school to discipline",
            vec![Arc::new(RenameSchoolToDiscipline)],
        ),
    )?;
    registry.register(
        SemVer::new(0, 5, 0),
        step(
            "Remove copied legacy actor flags",
            vec![Arc::new(DropLegacyFlags)],
        ),
    )?;
    registry.register(
        SemVer::new(0, 6, 0),
        step(
            "Persist power augments on actions and drop stale schools",
            vec![Arc::new(PersistAugmentRelocation), Arc::new(DropStaleSchool)],
        ),
    )?;
    Ok(registry)
}
