//! Migration registry.
//!
//! Maps each schema version to the migration that brings stored documents
//! up to it. Enumeration is always in ascending version order.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use grimoire_domain::SemVer;

use super::error::MigrationError;
use super::outcome::VersionMigrationOutcome;

/// One schema version's worth of work.
///
/// Implementations must be idempotent: running again over documents that
/// are already migrated writes nothing.
#[async_trait]
pub trait Migration: Send + Sync {
    fn description(&self) -> &str;
    async fn migrate(&self) -> VersionMigrationOutcome;
}

/// A migration together with the version it belongs to.
#[derive(Clone)]
pub struct RegisteredMigration {
    pub version: SemVer,
    pub migration: Arc<dyn Migration>,
}

#[derive(Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<SemVer, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        version: SemVer,
        migration: Arc<dyn Migration>,
    ) -> Result<(), MigrationError> {
        if self.migrations.contains_key(&version) {
            return Err(MigrationError::DuplicateVersion(version));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Every registered version, oldest first.
    pub fn ordered_versions(&self) -> Vec<SemVer> {
        self.migrations.keys().copied().collect()
    }

    /// Migrations newer than `from` and not newer than `to`, oldest first.
    pub fn pending(&self, from: &SemVer, to: &SemVer) -> Vec<RegisteredMigration> {
        if from >= to {
            return Vec::new();
        }

        self.migrations
            .range((Bound::Excluded(*from), Bound::Included(*to)))
            .map(|(version, migration)| RegisteredMigration {
                version: *version,
                migration: migration.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
