//! Host-environment ports: time, leadership and notifications.

use chrono::{DateTime, Utc};

use super::types::Notification;

/// Wall clock; tests use a fixed one.
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Whether this process is the single coordinator allowed to migrate.
#[cfg_attr(test, mockall::automock)]
pub trait LeadershipPort: Send + Sync {
    fn is_leader(&self) -> bool;
}

#[cfg_attr(test, mockall::automock)]
pub trait NotifierPort: Send + Sync {
    fn notify(&self, notification: Notification);
}
