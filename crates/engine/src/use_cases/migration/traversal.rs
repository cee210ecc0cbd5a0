//! Entity traversal for per-version migrations.
//!
//! Visits every place a document of a given kind can live: the world
//! collection, items owned by world actors, matching archives, and items
//! owned by actors inside archives. A failure on one document is logged
//! and counted; traversal moves on.

use std::sync::Arc;

use grimoire_domain::{Document, DocumentKind, DocumentLocation, DocumentUpdate, DomainError};

use crate::infrastructure::ports::{ArchiveInfo, ArchiveRepo, DocumentRepo, Materialized};

use super::error::MigrationError;
use super::outcome::{EntityFailure, EntityMigrationOutcome, MigrationTally};

/// Transformation of one category of document.
pub trait DocumentMigration: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> DocumentKind;

    /// Narrow the candidates further, e.g. to one item type.
    fn applies_to(&self, _document: &Document) -> bool {
        true
    }

    /// Writes needed to migrate `document`, or `None` when it already has
    /// the target shape.
    fn plan(&self, document: &Document) -> Result<Option<DocumentUpdate>, DomainError>;
}

/// Whether `migration` has anything to do inside `archive`: documents of
/// its kind, or items owned by archived actors.
fn reaches_archive(migration: &dyn DocumentMigration, archive: &ArchiveInfo) -> bool {
    archive.kind == migration.kind()
        || (migration.kind() == DocumentKind::Item && archive.kind == DocumentKind::Actor)
}

/// Whether `document` should be handed to `migration` at all.
pub fn is_migration_candidate(document: &Document, migration: &dyn DocumentMigration) -> bool {
    document.kind() == migration.kind()
        && !document.doc_type().is_empty()
        && migration.applies_to(document)
}

pub struct Traversal {
    documents: Arc<dyn DocumentRepo>,
    archives: Arc<dyn ArchiveRepo>,
}

impl Traversal {
    pub fn new(documents: Arc<dyn DocumentRepo>, archives: Arc<dyn ArchiveRepo>) -> Self {
        Self {
            documents,
            archives,
        }
    }

    /// Apply `migration` everywhere a document of its kind is stored.
    ///
    /// Only failures to enumerate a collection are returned as errors.
    pub async fn run(
        &self,
        migration: &dyn DocumentMigration,
    ) -> Result<MigrationTally, MigrationError> {
        let mut tally = MigrationTally::default();

        let world = self.documents.list_world(migration.kind()).await?;
        self.migrate_batch(migration, world, &mut tally).await;

        if migration.kind() == DocumentKind::Item {
            let actors = self.documents.list_world(DocumentKind::Actor).await?;
            self.migrate_inventories(migration, &actors, &mut tally)
                .await?;
        }

        for archive in self.archives.list_archives().await? {
            if !reaches_archive(migration, &archive) {
                continue;
            }
            let archive_tally = self.migrate_archive(migration, &archive).await?;
            tally.merge(archive_tally);
        }

        tracing::info!(
            migration = migration.name(),
            updated = tally.updated,
            unchanged = tally.unchanged,
            failed = tally.failed,
            "Document migration finished"
        );
        Ok(tally)
    }

    /// Migrate the items owned by each of `owners`.
    ///
    /// Owners that failed to load still have their inventory visited: the
    /// stored row id is all that is needed to find it.
    async fn migrate_inventories(
        &self,
        migration: &dyn DocumentMigration,
        owners: &[Materialized],
        tally: &mut MigrationTally,
    ) -> Result<(), MigrationError> {
        for owner in owners {
            let (id, location) = match owner {
                Ok(actor) => (actor.id(), actor.location()),
                Err(invalid) => {
                    tracing::debug!(
                        actor = %invalid.id,
                        location = %invalid.location,
                        "Visiting inventory of an unreadable actor"
                    );
                    (&invalid.id, &invalid.location)
                }
            };
            let inventory = DocumentLocation::owned_by(id.clone(), location);
            let owned = self.documents.list_owned(&inventory).await?;
            self.migrate_batch(migration, owned, tally).await;
        }
        Ok(())
    }

    /// Unlock if needed, migrate the snapshots, then restore the lock even
    /// when migrating failed.
    async fn migrate_archive(
        &self,
        migration: &dyn DocumentMigration,
        archive: &ArchiveInfo,
    ) -> Result<MigrationTally, MigrationError> {
        if archive.locked {
            self.archives.set_locked(&archive.id, false).await?;
        }

        let result = self.migrate_archive_contents(migration, archive).await;

        if archive.locked {
            if let Err(e) = self.archives.set_locked(&archive.id, true).await {
                tracing::error!(archive = %archive.id, error = %e, "Failed to re-lock archive");
                if result.is_ok() {
                    return Err(e.into());
                }
            }
        }

        result
    }

    async fn migrate_archive_contents(
        &self,
        migration: &dyn DocumentMigration,
        archive: &ArchiveInfo,
    ) -> Result<MigrationTally, MigrationError> {
        let entries = self.archives.list_entries(&archive.id).await?;
        let mut tally = MigrationTally::default();

        if archive.kind == migration.kind() {
            self.migrate_batch(migration, entries, &mut tally).await;
        } else {
            // An actor archive seen by an item migration: its actors' items.
            self.migrate_inventories(migration, &entries, &mut tally)
                .await?;
        }
        Ok(tally)
    }

    async fn migrate_batch(
        &self,
        migration: &dyn DocumentMigration,
        batch: Vec<Materialized>,
        tally: &mut MigrationTally,
    ) {
        for entry in batch {
            let Some(outcome) = self.migrate_one(migration, entry).await else {
                continue;
            };
            if let EntityMigrationOutcome::Failed(failure) = &outcome {
                tracing::warn!(
                    migration = migration.name(),
                    document = %failure.document,
                    location = %failure.location,
                    reason = %failure.reason,
                    "Failed to migrate document"
                );
            }
            tally.record(&outcome);
        }
    }

    /// `None` for documents the migration does not concern.
    async fn migrate_one(
        &self,
        migration: &dyn DocumentMigration,
        entry: Materialized,
    ) -> Option<EntityMigrationOutcome> {
        let document = match entry {
            Ok(document) => document,
            Err(invalid) => {
                return Some(EntityMigrationOutcome::Failed(EntityFailure {
                    document: invalid.id,
                    location: invalid.location,
                    reason: invalid.error.to_string(),
                }))
            }
        };

        if !is_migration_candidate(&document, migration) {
            return None;
        }

        let failure = |reason: String| {
            EntityMigrationOutcome::Failed(EntityFailure {
                document: document.id().clone(),
                location: document.location().clone(),
                reason,
            })
        };

        let update = match migration.plan(&document) {
            Ok(Some(update)) => update,
            Ok(None) => return Some(EntityMigrationOutcome::Unchanged),
            Err(e) => return Some(failure(e.to_string())),
        };

        match self.documents.update(&document, &update).await {
            Ok(()) => {
                tracing::debug!(
                    migration = migration.name(),
                    document = %document.id(),
                    location = %document.location(),
                    "Migrated document"
                );
                Some(EntityMigrationOutcome::Updated)
            }
            Err(e) => Some(failure(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        InvalidDocument, MockArchiveRepo, MockDocumentRepo, RepoError,
    };
    use grimoire_domain::{
        ArchiveId, DocumentId, DocumentLocation, FieldPath, SchemaError,
    };
    use mockall::Sequence;
    use serde_json::json;

    /// Marks every item with `system.touched = true`.
    struct Touch;

    impl DocumentMigration for Touch {
        fn name(&self) -> &'static str {
            "touch"
        }

        fn kind(&self) -> DocumentKind {
            DocumentKind::Item
        }

        fn plan(&self, document: &Document) -> Result<Option<DocumentUpdate>, DomainError> {
            if document.source_value(&FieldPath::parse("system.touched")).is_some() {
                return Ok(None);
            }
            if document.name() == "explodes" {
                return Err(DomainError::validation("cannot plan"));
            }
            Ok(Some(
                DocumentUpdate::new().set(FieldPath::parse("system.touched"), json!(true)),
            ))
        }
    }

    fn item(id: &str, name: &str, location: DocumentLocation) -> Materialized {
        Ok(Document::materialize(
            DocumentKind::Item,
            location,
            json!({ "_id": id, "type": "equipment", "name": name, "system": {} }),
        )
        .expect("valid item"))
    }

    fn actor(id: &str) -> Materialized {
        Ok(Document::materialize(
            DocumentKind::Actor,
            DocumentLocation::World,
            json!({ "_id": id, "type": "character", "name": id }),
        )
        .expect("valid actor"))
    }

    fn no_archives() -> MockArchiveRepo {
        let mut archives = MockArchiveRepo::new();
        archives.expect_list_archives().returning(|| Ok(vec![]));
        archives
    }

    #[tokio::test]
    async fn one_failing_document_does_not_stop_the_batch() {
        let mut documents = MockDocumentRepo::new();
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Item)
            .returning(|_| {
                Ok(vec![
                    item("i1", "sword", DocumentLocation::World),
                    item("i2", "explodes", DocumentLocation::World),
                    Err(InvalidDocument {
                        id: DocumentId::new("i3"),
                        location: DocumentLocation::World,
                        error: SchemaError::MissingId,
                    }),
                    item("i4", "write fails", DocumentLocation::World),
                    item("i5", "shield", DocumentLocation::World),
                ])
            });
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Actor)
            .returning(|_| Ok(vec![]));
        documents
            .expect_update()
            .withf(|document, _| document.id().as_str() == "i4")
            .times(1)
            .returning(|_, _| Err(RepoError::database("documents.update", "disk full")));
        documents
            .expect_update()
            .withf(|document, _| document.id().as_str() != "i4")
            .times(2)
            .returning(|_, _| Ok(()));

        let traversal = Traversal::new(Arc::new(documents), Arc::new(no_archives()));
        let tally = traversal.run(&Touch).await.expect("traversal completes");

        assert_eq!(
            tally,
            MigrationTally {
                updated: 2,
                unchanged: 0,
                failed: 3
            }
        );
    }

    #[tokio::test]
    async fn items_owned_by_actors_are_visited() {
        let mut documents = MockDocumentRepo::new();
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Item)
            .returning(|_| Ok(vec![]));
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Actor)
            .returning(|_| Ok(vec![actor("hero"), actor("villain")]));
        documents.expect_list_owned().returning(|owner| {
            let name = match owner {
                DocumentLocation::Owned { parent, .. } => format!("{}-item", parent),
                _ => "misplaced".to_string(),
            };
            Ok(vec![item(&name, "dagger", owner.clone())])
        });
        documents
            .expect_update()
            .withf(|document, _| matches!(document.location(), DocumentLocation::Owned { .. }))
            .times(2)
            .returning(|_, _| Ok(()));

        let traversal = Traversal::new(Arc::new(documents), Arc::new(no_archives()));
        let tally = traversal.run(&Touch).await.expect("traversal completes");
        assert_eq!(tally.updated, 2);
    }

    #[tokio::test]
    async fn unreadable_actors_still_have_their_items_visited() {
        let mut documents = MockDocumentRepo::new();
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Item)
            .returning(|_| Ok(vec![]));
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Actor)
            .returning(|_| {
                Ok(vec![Err(InvalidDocument {
                    id: DocumentId::new("ghost"),
                    location: DocumentLocation::World,
                    error: SchemaError::InvalidJson("expected value".to_string()),
                })])
            });
        documents
            .expect_list_owned()
            .withf(|owner| {
                *owner == DocumentLocation::owned_by(DocumentId::new("ghost"), &DocumentLocation::World)
            })
            .times(1)
            .returning(|owner| Ok(vec![item("ghost-power", "focus", owner.clone())]));
        documents.expect_update().times(1).returning(|_, _| Ok(()));

        let traversal = Traversal::new(Arc::new(documents), Arc::new(no_archives()));
        let tally = traversal.run(&Touch).await.expect("traversal completes");
        assert_eq!(tally.updated, 1);
        assert_eq!(tally.failed, 0);
    }

    #[tokio::test]
    async fn items_of_archived_actors_are_migrated_inside_the_unlock_window() {
        let mut documents = MockDocumentRepo::new();
        documents.expect_list_world().returning(|_| Ok(vec![]));
        documents
            .expect_list_owned()
            .withf(|owner| owner.archive().map(|archive| archive.as_str()) == Some("heroes"))
            .times(1)
            .returning(|owner| Ok(vec![item("hero-power", "kinesis", owner.clone())]));

        let mut archives = MockArchiveRepo::new();
        archives.expect_list_archives().returning(|| {
            Ok(vec![ArchiveInfo {
                id: ArchiveId::new("heroes"),
                label: "Heroes".to_string(),
                kind: DocumentKind::Actor,
                locked: true,
            }])
        });
        archives.expect_list_entries().returning(|archive| {
            let location = DocumentLocation::Archive {
                archive: ArchiveId::new(archive.as_str()),
            };
            Ok(vec![Ok(Document::materialize(
                DocumentKind::Actor,
                location,
                json!({ "_id": "hero", "type": "character", "name": "Hero" }),
            )
            .expect("valid actor"))])
        });

        let mut seq = Sequence::new();
        archives
            .expect_set_locked()
            .withf(|_, locked| !*locked)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        documents
            .expect_update()
            .withf(|document, _| document.id().as_str() == "hero-power")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        archives
            .expect_set_locked()
            .withf(|_, locked| *locked)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let traversal = Traversal::new(Arc::new(documents), Arc::new(archives));
        let tally = traversal.run(&Touch).await.expect("traversal completes");
        assert_eq!(tally.updated, 1);
    }

    #[tokio::test]
    async fn actor_migrations_do_not_open_item_archives() {
        struct TouchActors;

        impl DocumentMigration for TouchActors {
            fn name(&self) -> &'static str {
                "touch-actors"
            }

            fn kind(&self) -> DocumentKind {
                DocumentKind::Actor
            }

            fn plan(&self, _document: &Document) -> Result<Option<DocumentUpdate>, DomainError> {
                Ok(None)
            }
        }

        let mut documents = MockDocumentRepo::new();
        documents.expect_list_world().returning(|_| Ok(vec![]));
        documents.expect_list_owned().never();

        let mut archives = MockArchiveRepo::new();
        archives.expect_list_archives().returning(|| {
            Ok(vec![ArchiveInfo {
                id: ArchiveId::new("grimoire.powers"),
                label: "Powers".to_string(),
                kind: DocumentKind::Item,
                locked: true,
            }])
        });
        archives.expect_set_locked().never();
        archives.expect_list_entries().never();

        let traversal = Traversal::new(Arc::new(documents), Arc::new(archives));
        let tally = traversal.run(&TouchActors).await.expect("traversal completes");
        assert_eq!(tally.visited(), 0);
    }

    #[tokio::test]
    async fn already_migrated_and_foreign_documents_are_not_written() {
        let mut documents = MockDocumentRepo::new();
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Item)
            .returning(|_| {
                let done = Document::materialize(
                    DocumentKind::Item,
                    DocumentLocation::World,
                    json!({ "_id": "done", "type": "equipment", "system": { "touched": true } }),
                )
                .expect("valid");
                let untyped = Document::materialize(
                    DocumentKind::Item,
                    DocumentLocation::World,
                    json!({ "_id": "untyped" }),
                )
                .expect("valid");
                Ok(vec![Ok(done), Ok(untyped)])
            });
        documents
            .expect_list_world()
            .withf(|kind| *kind == DocumentKind::Actor)
            .returning(|_| Ok(vec![]));
        documents.expect_update().never();

        let traversal = Traversal::new(Arc::new(documents), Arc::new(no_archives()));
        let tally = traversal.run(&Touch).await.expect("traversal completes");
        assert_eq!(tally.unchanged, 1);
        assert_eq!(tally.visited(), 1);
    }

    #[tokio::test]
    async fn locked_archive_is_unlocked_and_relocked_even_on_error() {
        let archive_id = ArchiveId::new("grimoire.powers");

        let mut documents = MockDocumentRepo::new();
        documents.expect_list_world().returning(|_| Ok(vec![]));

        let mut archives = MockArchiveRepo::new();
        let mut seq = Sequence::new();
        let listed = archive_id.clone();
        archives.expect_list_archives().returning(move || {
            Ok(vec![
                ArchiveInfo {
                    id: listed.clone(),
                    label: "Powers".to_string(),
                    kind: DocumentKind::Item,
                    locked: true,
                },
                ArchiveInfo {
                    id: ArchiveId::new("grimoire.heroes"),
                    label: "Heroes".to_string(),
                    kind: DocumentKind::Actor,
                    locked: true,
                },
            ])
        });
        archives
            .expect_set_locked()
            .withf(|id, locked| id.as_str() == "grimoire.powers" && !*locked)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        archives
            .expect_list_entries()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RepoError::database("archives.list", "unreadable")));
        archives
            .expect_set_locked()
            .withf(|id, locked| id.as_str() == "grimoire.powers" && *locked)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let traversal = Traversal::new(Arc::new(documents), Arc::new(archives));
        let err = traversal.run(&Touch).await.expect_err("archive unreadable");
        assert!(matches!(err, MigrationError::Repo(_)));
    }

    #[tokio::test]
    async fn unlocked_archive_stays_unlocked() {
        let mut documents = MockDocumentRepo::new();
        documents.expect_list_world().returning(|_| Ok(vec![]));
        documents.expect_update().times(1).returning(|_, _| Ok(()));

        let mut archives = MockArchiveRepo::new();
        archives.expect_list_archives().returning(|| {
            Ok(vec![ArchiveInfo {
                id: ArchiveId::new("grimoire.gear"),
                label: "Gear".to_string(),
                kind: DocumentKind::Item,
                locked: false,
            }])
        });
        archives.expect_set_locked().never();
        archives.expect_list_entries().returning(|archive| {
            let location = DocumentLocation::Archive {
                archive: ArchiveId::new(archive.as_str()),
            };
            Ok(vec![item("g1", "rope", location)])
        });

        let traversal = Traversal::new(Arc::new(documents), Arc::new(archives));
        let tally = traversal.run(&Touch).await.expect("traversal completes");
        assert_eq!(tally.updated, 1);
    }

    #[tokio::test]
    async fn failing_to_list_the_world_is_fatal() {
        let mut documents = MockDocumentRepo::new();
        documents
            .expect_list_world()
            .returning(|_| Err(RepoError::database("documents.list", "gone")));

        let traversal = Traversal::new(Arc::new(documents), Arc::new(MockArchiveRepo::new()));
        assert!(traversal.run(&Touch).await.is_err());
    }
}
