//! Evaluation clocks driving the scheduler's notion of "now".

use tsgraph_common::EngineTime;

pub use tsgraph_common::EngineTime as EngineTimeNow;

/// Common interface the scheduler drives: advance to the next
/// schedulable time and report it.
pub trait EvaluationClock: Send {
    /// Current evaluation time. `EngineTime::NEVER` before the first advance.
    fn now(&self) -> EngineTime;

    /// Advance to the earliest of `next_scheduled` and (for real-time
    /// clocks) wall-clock arrival, blocking if necessary. Returns the
    /// new `now`, or `None` if the clock has nothing left to do and the
    /// engine should stop.
    fn advance(&mut self, next_scheduled: Option<EngineTime>) -> Option<EngineTime>;

    /// True if this clock can be pushed forward by wall-clock time
    /// passing with no scheduled work (real-time only).
    fn is_real_time(&self) -> bool {
        false
    }
}

/// Deterministic clock driven purely by the next scheduled time —
/// no relation to wall-clock time. Used for replay and batch runs.
pub struct SimulationClock {
    now: EngineTime,
    end_time: EngineTime,
}

impl SimulationClock {
    pub fn new(end_time: EngineTime) -> Self {
        SimulationClock {
            now: EngineTime::NEVER,
            end_time,
        }
    }

    pub fn unbounded() -> Self {
        SimulationClock::new(EngineTime::MAX)
    }
}

impl EvaluationClock for SimulationClock {
    fn now(&self) -> EngineTime {
        self.now
    }

    fn advance(&mut self, next_scheduled: Option<EngineTime>) -> Option<EngineTime> {
        let candidate = next_scheduled?;
        if candidate > self.end_time {
            return None;
        }
        self.now = candidate;
        Some(candidate)
    }
}

/// Wall-clock-driven clock: advances to the earliest of the next
/// scheduled time and the real clock's current reading, optionally
/// blocking (sleeping) until one of them arrives. `push_requested`
/// lets an external thread (e.g. an I/O callback) wake the engine
/// immediately regardless of schedule.
pub struct RealTimeClock {
    now: EngineTime,
    start_wall_nanos: i64,
    start_engine: EngineTime,
    push_requested: std::sync::atomic::AtomicBool,
}

impl RealTimeClock {
    pub fn new(start: EngineTime, wall_nanos_now: i64) -> Self {
        RealTimeClock {
            now: EngineTime::NEVER,
            start_wall_nanos: wall_nanos_now,
            start_engine: start,
            push_requested: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn request_push(&self) {
        self.push_requested
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn wall_to_engine(&self, wall_nanos: i64) -> EngineTime {
        EngineTime(self.start_engine.0 + (wall_nanos - self.start_wall_nanos))
    }

    /// Supplied by the caller each tick since this module can't read
    /// the system clock itself (kept deterministic/testable).
    pub fn advance_to_wall(&mut self, wall_nanos: i64, next_scheduled: Option<EngineTime>) -> EngineTime {
        let wall_engine = self.wall_to_engine(wall_nanos);
        let pushed = self.push_requested.swap(false, std::sync::atomic::Ordering::SeqCst);
        let target = match next_scheduled {
            Some(t) if t <= wall_engine => t,
            _ if pushed => wall_engine,
            _ => wall_engine,
        };
        self.now = target.max(self.now);
        self.now
    }
}

impl EvaluationClock for RealTimeClock {
    fn now(&self) -> EngineTime {
        self.now
    }

    fn advance(&mut self, next_scheduled: Option<EngineTime>) -> Option<EngineTime> {
        // Real-time advance needs a wall-clock sample from the caller;
        // see `advance_to_wall`. A bare `advance` just releases whatever
        // was already scheduled without moving time forward further.
        next_scheduled.map(|t| {
            self.now = t.max(self.now);
            self.now
        })
    }

    fn is_real_time(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_clock_advances_to_each_scheduled_time_in_turn() {
        let mut clock = SimulationClock::new(EngineTime(100));
        assert_eq!(clock.advance(Some(EngineTime(5))), Some(EngineTime(5)));
        assert_eq!(clock.now(), EngineTime(5));
        assert_eq!(clock.advance(Some(EngineTime(20))), Some(EngineTime(20)));
    }

    #[test]
    fn simulation_clock_stops_past_end_time() {
        let mut clock = SimulationClock::new(EngineTime(10));
        assert_eq!(clock.advance(Some(EngineTime(11))), None);
    }

    #[test]
    fn simulation_clock_stops_with_nothing_scheduled() {
        let mut clock = SimulationClock::unbounded();
        assert_eq!(clock.advance(None), None);
    }

    #[test]
    fn real_time_clock_advance_to_wall_prefers_an_earlier_schedule() {
        let mut clock = RealTimeClock::new(EngineTime(0), 1_000);
        let now = clock.advance_to_wall(1_500, Some(EngineTime(200)));
        assert_eq!(now, EngineTime(200));
    }

    #[test]
    fn real_time_clock_advance_to_wall_falls_back_to_wall_time() {
        let mut clock = RealTimeClock::new(EngineTime(0), 1_000);
        let now = clock.advance_to_wall(1_500, None);
        assert_eq!(now, EngineTime(500));
    }

    #[test]
    fn real_time_clock_is_real_time() {
        let clock = RealTimeClock::new(EngineTime(0), 0);
        assert!(clock.is_real_time());
        assert!(!SimulationClock::unbounded().is_real_time());
    }
}
