//! Leadership as decided by the host.
//!
//! The host environment elects one coordinator among connected processes;
//! the engine only asks whether that is us.

use crate::infrastructure::ports::LeadershipPort;

/// Leadership fixed at startup from configuration.
pub struct StaticLeadership {
    is_leader: bool,
}

impl StaticLeadership {
    pub fn new(is_leader: bool) -> Self {
        Self { is_leader }
    }
}

impl LeadershipPort for StaticLeadership {
    fn is_leader(&self) -> bool {
        self.is_leader
    }
}
