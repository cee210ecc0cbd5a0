//! Migration runner.
//!
//! Compares the stored schema marker with the running version, runs the
//! pending migrations strictly in order, and moves the marker forward after
//! each success. The first failing version stops the run; it is retried on
//! the next start.

use std::sync::Arc;

use grimoire_domain::SemVer;
use tokio::sync::RwLock;

use crate::infrastructure::ports::{
    LeadershipPort, Notification, NotificationLevel, NotifierPort, SettingsRepo,
};

use super::error::MigrationError;
use super::outcome::{MigrationRun, MigrationTally, VersionMigrationOutcome};
use super::registry::MigrationRegistry;

/// Settings namespace holding the marker.
pub const MARKER_NAMESPACE: &str = "grimoire";

/// Highest migration version fully applied to this world.
pub const MARKER_KEY: &str = "systemMigrationVersion";

/// Where the runner is in its current (or last) invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerPhase {
    Idle,
    CheckingMarker,
    Running { index: usize, version: SemVer },
    Advancing { to: SemVer },
    Done,
    Halted { version: SemVer },
}

pub struct MigrationRunner {
    registry: Arc<MigrationRegistry>,
    settings: Arc<dyn SettingsRepo>,
    leadership: Arc<dyn LeadershipPort>,
    notifier: Arc<dyn NotifierPort>,
    target: SemVer,
    phase: RwLock<RunnerPhase>,
}

impl MigrationRunner {
    pub fn new(
        registry: Arc<MigrationRegistry>,
        settings: Arc<dyn SettingsRepo>,
        leadership: Arc<dyn LeadershipPort>,
        notifier: Arc<dyn NotifierPort>,
        target: SemVer,
    ) -> Self {
        Self {
            registry,
            settings,
            leadership,
            notifier,
            target,
            phase: RwLock::new(RunnerPhase::Idle),
        }
    }

    pub fn target(&self) -> SemVer {
        self.target
    }

    pub async fn phase(&self) -> RunnerPhase {
        self.phase.read().await.clone()
    }

    async fn enter(&self, phase: RunnerPhase) {
        tracing::debug!(?phase, "Migration runner phase");
        *self.phase.write().await = phase;
    }

    /// Stored marker, `0.0.0` when the world never migrated.
    pub async fn stored_version(&self) -> Result<SemVer, MigrationError> {
        match self.settings.get(MARKER_NAMESPACE, MARKER_KEY).await? {
            None => Ok(SemVer::ZERO),
            Some(value) => SemVer::parse(&value)
                .map_err(|source| MigrationError::InvalidMarker { value, source }),
        }
    }

    async fn write_marker(&self, version: SemVer) -> Result<(), MigrationError> {
        self.settings
            .set(MARKER_NAMESPACE, MARKER_KEY, &version.to_string())
            .await?;
        Ok(())
    }

    /// Run every migration newer than the stored marker, up to the running
    /// version.
    ///
    /// Errors are only returned when the marker cannot be read (or, with no
    /// migration pending, written); a failing migration is reported as
    /// [`MigrationRun::Halted`].
    pub async fn run_migrations(&self) -> Result<MigrationRun, MigrationError> {
        if !self.leadership.is_leader() {
            tracing::debug!("Not the coordinating process, skipping migrations");
            return Ok(MigrationRun::NotLeader);
        }

        self.enter(RunnerPhase::CheckingMarker).await;
        let stored = match self.stored_version().await {
            Ok(stored) => stored,
            Err(e) => {
                self.enter(RunnerPhase::Idle).await;
                return Err(e);
            }
        };

        if !self.target.is_newer_than(&stored) {
            tracing::debug!(stored = %stored, target = %self.target, "Schema is up to date");
            self.enter(RunnerPhase::Done).await;
            return Ok(MigrationRun::UpToDate { current: stored });
        }

        let pending = self.registry.pending(&stored, &self.target);
        if pending.is_empty() {
            self.enter(RunnerPhase::Advancing { to: self.target }).await;
            if let Err(e) = self.write_marker(self.target).await {
                self.enter(RunnerPhase::Idle).await;
                return Err(e);
            }
            tracing::info!(from = %stored, to = %self.target, "No migrations pending, marker advanced");
            self.enter(RunnerPhase::Done).await;
            return Ok(MigrationRun::Advanced {
                from: stored,
                to: self.target,
            });
        }

        tracing::info!(
            from = %stored,
            to = %self.target,
            pending = pending.len(),
            "Running schema migrations"
        );

        let mut applied = Vec::with_capacity(pending.len());
        let mut tally = MigrationTally::default();

        for (index, entry) in pending.into_iter().enumerate() {
            let version = entry.version;
            self.enter(RunnerPhase::Running { index, version }).await;
            tracing::info!(
                version = %version,
                description = entry.migration.description(),
                "Applying migration"
            );

            // Documents were written even if recording the marker fails, so
            // the version's tally counts either way.
            let result = match entry.migration.migrate().await {
                VersionMigrationOutcome::Ok(version_tally) => {
                    tally.merge(version_tally);
                    self.enter(RunnerPhase::Advancing { to: version }).await;
                    self.write_marker(version).await
                }
                VersionMigrationOutcome::Fatal(error) => Err(error),
            };

            match result {
                Ok(()) => applied.push(version),
                Err(error) => {
                    tracing::error!(version = %version, error = %error, "Migration failed, halting");
                    self.enter(RunnerPhase::Halted { version }).await;
                    let run = MigrationRun::Halted {
                        applied,
                        tally,
                        failed: version,
                        error,
                    };
                    self.notify_summary(&run);
                    return Ok(run);
                }
            }
        }

        self.enter(RunnerPhase::Done).await;
        let run = MigrationRun::Completed { applied, tally };
        self.notify_summary(&run);
        Ok(run)
    }

    fn notify_summary(&self, run: &MigrationRun) {
        let notification = match run {
            MigrationRun::Completed { applied, tally } => Notification::new(
                if tally.failed == 0 {
                    NotificationLevel::Info
                } else {
                    NotificationLevel::Warning
                },
                format!(
                    "Applied {} migration(s) up to {}; {} failure(s) across {} document(s)",
                    applied.len(),
                    self.target,
                    tally.failed,
                    tally.visited()
                ),
            ),
            MigrationRun::Halted {
                applied,
                tally,
                failed,
                ..
            } => Notification::new(
                NotificationLevel::Error,
                format!(
                    "Applied {} migration(s); migration {} failed and later migrations were not run; {} document failure(s)",
                    applied.len(),
                    failed,
                    tally.failed
                ),
            ),
            _ => return,
        };
        self.notifier.notify(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        MockLeadershipPort, MockNotifierPort, MockSettingsRepo, RepoError,
    };
    use crate::use_cases::migration::registry::Migration;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake migration that counts invocations.
    struct Counting {
        calls: AtomicUsize,
        fails: bool,
    }

    impl Counting {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fails: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fails: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Migration for Counting {
        fn description(&self) -> &str {
            "counting"
        }

        async fn migrate(&self) -> VersionMigrationOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                VersionMigrationOutcome::Fatal(MigrationError::failed("structural assumption broken"))
            } else {
                VersionMigrationOutcome::Ok(MigrationTally {
                    updated: 1,
                    unchanged: 0,
                    failed: 0,
                })
            }
        }
    }

    fn v(version: &str) -> SemVer {
        version.parse().expect("valid version")
    }

    fn leader(is_leader: bool) -> Arc<MockLeadershipPort> {
        let mut leadership = MockLeadershipPort::new();
        leadership.expect_is_leader().return_const(is_leader);
        Arc::new(leadership)
    }

    fn quiet_notifier() -> Arc<MockNotifierPort> {
        let mut notifier = MockNotifierPort::new();
        notifier.expect_notify().return_const(());
        Arc::new(notifier)
    }

    fn stored(marker: Option<&'static str>) -> MockSettingsRepo {
        let mut settings = MockSettingsRepo::new();
        settings
            .expect_get()
            .withf(|namespace, key| namespace.to_string() == MARKER_NAMESPACE && key.to_string() == MARKER_KEY)
            .returning(move |_, _| Ok(marker.map(str::to_string)));
        settings
    }

    fn runner(
        registry: MigrationRegistry,
        settings: MockSettingsRepo,
        leadership: Arc<MockLeadershipPort>,
        notifier: Arc<MockNotifierPort>,
        target: &str,
    ) -> MigrationRunner {
        MigrationRunner::new(
            Arc::new(registry),
            Arc::new(settings),
            leadership,
            notifier,
            v(target),
        )
    }

    #[tokio::test]
    async fn halts_on_first_failure_and_keeps_last_good_marker() {
        let first = Counting::ok();
        let second = Counting::failing();
        let third = Counting::ok();
        let mut registry = MigrationRegistry::new();
        registry.register(v("0.1.0"), first.clone()).expect("register");
        registry.register(v("0.2.0"), second.clone()).expect("register");
        registry.register(v("0.3.0"), third.clone()).expect("register");

        let mut settings = stored(Some("0.0.0"));
        settings
            .expect_set()
            .withf(|_, _, value| value.to_string() == "0.1.0")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut notifier = MockNotifierPort::new();
        notifier
            .expect_notify()
            .withf(|notification| notification.level == NotificationLevel::Error)
            .times(1)
            .return_const(());

        let runner = runner(registry, settings, leader(true), Arc::new(notifier), "0.3.0");
        let run = runner.run_migrations().await.expect("run");

        assert!(!run.succeeded());
        assert!(matches!(run, MigrationRun::Halted { failed, .. } if failed == v("0.2.0")));
        assert_eq!(run.applied(), &[v("0.1.0")]);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
        assert_eq!(
            runner.phase().await,
            RunnerPhase::Halted {
                version: v("0.2.0")
            }
        );
    }

    #[tokio::test]
    async fn runs_pending_in_order_and_advances_marker_each_step() {
        let mut registry = MigrationRegistry::new();
        let older = Counting::ok();
        let newer = Counting::ok();
        let future = Counting::ok();
        registry.register(v("0.4.1"), newer.clone()).expect("register");
        registry.register(v("0.3.1"), older.clone()).expect("register");
        registry.register(v("0.6.1"), future.clone()).expect("register");

        let mut settings = stored(Some("0.3.0"));
        let mut seq = mockall::Sequence::new();
        settings
            .expect_set()
            .withf(|_, _, value| value.to_string() == "0.3.1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        settings
            .expect_set()
            .withf(|_, _, value| value.to_string() == "0.4.1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let runner = runner(registry, settings, leader(true), quiet_notifier(), "0.5.0");
        let run = runner.run_migrations().await.expect("run");

        assert!(run.succeeded());
        assert_eq!(run.applied(), &[v("0.3.1"), v("0.4.1")]);
        assert_eq!(future.calls(), 0);
        assert!(matches!(
            run,
            MigrationRun::Completed { tally, .. } if tally.updated == 2
        ));
        assert_eq!(runner.phase().await, RunnerPhase::Done);
    }

    #[tokio::test]
    async fn advances_marker_over_a_gap_without_migrations() {
        let mut registry = MigrationRegistry::new();
        let old = Counting::ok();
        registry.register(v("0.1.0"), old.clone()).expect("register");

        let mut settings = stored(Some("0.2.0"));
        settings
            .expect_set()
            .withf(|_, _, value| value.to_string() == "0.5.0")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let runner = runner(registry, settings, leader(true), quiet_notifier(), "0.5.0");
        let run = runner.run_migrations().await.expect("run");

        assert!(matches!(
            run,
            MigrationRun::Advanced { from, to } if from == v("0.2.0") && to == v("0.5.0")
        ));
        assert_eq!(old.calls(), 0);
    }

    #[tokio::test]
    async fn nothing_to_do_when_marker_is_current() {
        let mut registry = MigrationRegistry::new();
        let migration = Counting::ok();
        registry.register(v("0.5.0"), migration.clone()).expect("register");

        let mut settings = stored(Some("0.6.0"));
        settings.expect_set().never();

        let runner = runner(registry, settings, leader(true), quiet_notifier(), "0.5.0");
        let run = runner.run_migrations().await.expect("run");

        assert!(matches!(run, MigrationRun::UpToDate { current } if current == v("0.6.0")));
        assert_eq!(migration.calls(), 0);
    }

    #[tokio::test]
    async fn followers_skip_without_touching_settings() {
        let mut registry = MigrationRegistry::new();
        let migration = Counting::ok();
        registry.register(v("0.1.0"), migration.clone()).expect("register");

        let mut settings = MockSettingsRepo::new();
        settings.expect_get().never();
        settings.expect_set().never();

        let runner = runner(registry, settings, leader(false), quiet_notifier(), "0.1.0");
        let run = runner.run_migrations().await.expect("run");

        assert!(matches!(run, MigrationRun::NotLeader));
        assert!(run.succeeded());
        assert_eq!(migration.calls(), 0);
        assert_eq!(runner.phase().await, RunnerPhase::Idle);
    }

    #[tokio::test]
    async fn missing_marker_starts_from_zero() {
        let mut registry = MigrationRegistry::new();
        let migration = Counting::ok();
        registry.register(v("0.0.1"), migration.clone()).expect("register");

        let mut settings = stored(None);
        settings
            .expect_set()
            .withf(|_, _, value| value.to_string() == "0.0.1")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let runner = runner(registry, settings, leader(true), quiet_notifier(), "0.0.1");
        let run = runner.run_migrations().await.expect("run");
        assert_eq!(run.applied(), &[v("0.0.1")]);
        assert_eq!(migration.calls(), 1);
    }

    #[tokio::test]
    async fn unparsable_marker_is_an_error() {
        let mut settings = stored(Some("not-a-version"));
        settings.expect_set().never();

        let runner = runner(
            MigrationRegistry::new(),
            settings,
            leader(true),
            quiet_notifier(),
            "0.1.0",
        );
        let err = runner.run_migrations().await.expect_err("bad marker");
        assert!(matches!(err, MigrationError::InvalidMarker { .. }));
    }

    #[tokio::test]
    async fn failed_marker_write_halts_progression() {
        let mut registry = MigrationRegistry::new();
        let first = Counting::ok();
        let second = Counting::ok();
        registry.register(v("0.1.0"), first.clone()).expect("register");
        registry.register(v("0.2.0"), second.clone()).expect("register");

        let mut settings = stored(Some("0.0.0"));
        settings
            .expect_set()
            .times(1)
            .returning(|_, _, _| Err(RepoError::database("settings.set", "read-only")));

        let runner = runner(registry, settings, leader(true), quiet_notifier(), "0.2.0");
        let run = runner.run_migrations().await.expect("run");

        assert!(matches!(
            run,
            MigrationRun::Halted { failed, error: MigrationError::Repo(_), .. } if failed == v("0.1.0")
        ));
        assert!(matches!(
            run,
            MigrationRun::Halted { tally, .. } if tally.updated == 1
        ));
        assert!(run.applied().is_empty());
        assert_eq!(second.calls(), 0);
    }
}
