use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// Both ends of the pipeline stamp and compare time in this unit so latency
/// never depends on float formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpochMillis(pub i64);

impl EpochMillis {
    /// Convert wire seconds (`1503.123`) to millis, rounding to the nearest millisecond.
    /// Returns `None` for NaN or infinite input.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        Some(EpochMillis((secs * 1000.0).round() as i64))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Signed distance from `earlier` to `self`; negative when `earlier` is in the future.
    pub fn millis_since(self, earlier: EpochMillis) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Abstraction over current time for testability.
pub trait Clock: Send + Sync {
    fn now(&self) -> EpochMillis;
}

/// Production clock backed by `SystemTime`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochMillis {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        EpochMillis(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: EpochMillis) -> Self {
        Self { millis: AtomicI64::new(start.0) }
    }

    pub fn set(&self, at: EpochMillis) {
        self.millis.store(at.0, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EpochMillis {
        EpochMillis(self.millis.load(Ordering::SeqCst))
    }
}
