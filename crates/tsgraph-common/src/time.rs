//! Engine time: a 64-bit monotonic timestamp advanced by the scheduler.
//!
//! `EngineTime` carries no wall-clock meaning by itself — a `SIMULATION`
//! engine and a `REAL_TIME` engine both just hand the scheduler an
//! ever-increasing `i64`. What the number *means* (microseconds since
//! epoch, nanoseconds since start-of-run, …) is a decision the clock
//! implementation makes; the rest of the engine only compares and orders.

use std::fmt;

/// A point in engine time.
///
/// `EngineTime::NEVER` is the sentinel used for "this position has never
/// been set" (see `is_valid()`); it sorts before every real timestamp so
/// monotonicity checks don't need a special case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EngineTime(pub i64);

impl EngineTime {
    pub const NEVER: EngineTime = EngineTime(i64::MIN);
    pub const MIN_SCHEDULABLE: EngineTime = EngineTime(i64::MIN + 1);
    pub const MAX: EngineTime = EngineTime(i64::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NEVER
    }

    #[inline]
    pub fn succ(self) -> EngineTime {
        EngineTime(self.0.saturating_add(1))
    }
}

impl fmt::Display for EngineTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NEVER {
            write!(f, "t=never")
        } else {
            write!(f, "t={}", self.0)
        }
    }
}

impl From<i64> for EngineTime {
    fn from(v: i64) -> Self {
        EngineTime(v)
    }
}
