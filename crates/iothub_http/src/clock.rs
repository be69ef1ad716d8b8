//! Wall-clock abstraction.

use std::sync::Arc;
use std::time::SystemTime;

/// Source of wall-clock time.
///
/// `None` means the clock could not be read. The engine treats that as
/// "polling is due" and skips recording the poll time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Option<SystemTime>;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<SystemTime> {
        Some(SystemTime::now())
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Option<SystemTime> {
        (**self).now()
    }
}
