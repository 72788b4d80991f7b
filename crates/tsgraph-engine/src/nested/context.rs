//! The small bundle of ambient state every sub-graph needs: clock
//! origin and whether it's running real-time, passed down rather than
//! rediscovered per nested instance.

use tsgraph_common::EngineTime;

#[derive(Debug, Clone, Copy)]
pub struct GraphContext {
    pub start_time: EngineTime,
    pub is_real_time: bool,
}

impl GraphContext {
    pub fn new(start_time: EngineTime, is_real_time: bool) -> Self {
        GraphContext { start_time, is_real_time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_carries_start_time_and_real_time_flag_through() {
        let ctx = GraphContext::new(EngineTime(42), true);
        assert_eq!(ctx.start_time, EngineTime(42));
        assert!(ctx.is_real_time);
    }
}
