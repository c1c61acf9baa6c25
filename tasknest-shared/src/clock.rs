/// Time source used by components whose behaviour depends on "now"
///
/// Production code uses [`DefaultClock`]; tests drive a [`ManualClock`] so
/// sliding windows, retention cut-offs and overdue flags can be checked
/// without sleeping.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use chrono::Duration;
/// use tasknest_shared::clock::{Clock, ManualClock, SharedClock};
///
/// let manual = Arc::new(ManualClock::epoch());
/// let clock: SharedClock = manual.clone();
/// let before = clock.utc();
/// manual.advance(Duration::seconds(61));
/// assert_eq!((clock.utc() - before).num_seconds(), 61);
/// ```

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use std::sync::{Arc, Mutex};

pub use mockable::{Clock, DefaultClock};

/// Clock handle shared between components
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Returns the wall clock
pub fn system_clock() -> SharedClock {
    Arc::new(DefaultClock)
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock frozen at a fixed, arbitrary instant (2025-01-01T00:00:00Z)
    pub fn epoch() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    /// Moves the clock forward (or backward for negative durations)
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    /// Pins the clock to an exact instant
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = at;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
