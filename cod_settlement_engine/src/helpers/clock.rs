use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// The source of "now" for every time-dependent rule (hold periods, collection timestamps, reconciliation windows).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Arc::new(RwLock::new(now)) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut lock = self.now.write().unwrap_or_else(|e| e.into_inner());
        *lock = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut lock = self.now.write().unwrap_or_else(|e| e.into_inner());
        *lock += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
