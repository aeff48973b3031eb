//! Wall-clock abstraction.
//!
//! Engines read the current time through a [`Clock`] so tests can pin it.

use chrono::{DateTime, Duration, Local, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock shared between engines
pub type SharedClock = Arc<dyn Clock>;

/// The real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whether two instants fall on the same calendar day in local time
pub fn same_local_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.with_timezone(&Local).date_naive() == b.with_timezone(&Local).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local_noon() -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2024, 3, 14, 12, 0, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(local_noon());
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), local_noon() + Duration::seconds(90));

        clock.set(local_noon());
        assert_eq!(clock.now(), local_noon());
    }

    #[test]
    fn test_same_local_day() {
        let noon = local_noon();
        assert!(same_local_day(noon, noon + Duration::hours(3)));
        assert!(!same_local_day(noon, noon - Duration::days(1)));
        assert!(!same_local_day(noon, noon + Duration::days(1)));
    }
}
