//! Time source for event timestamps.
//!
//! The engine never reads `Utc::now()` directly; it stamps events through a
//! [`Clock`] so tests can pin time.

use chrono::{DateTime, Utc};

/// Where event timestamps come from.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, for production sessions.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
