use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduler {
    pub num_decoded: u64,
    pub dispatched: u64,
    /// Instructions that matched no registered execution unit.
    pub dropped: u64,
    /// Cycles the candidate waited on an in-flight memory hazard.
    pub hazard_stall: u64,
    /// Cycles the candidate waited for its destination unit to become ready.
    pub unit_busy_stall: u64,
    /// Cycles spent draining after the last instruction was decoded.
    pub drain_cycles: u64,
}

impl std::ops::AddAssign for Scheduler {
    fn add_assign(&mut self, other: Self) {
        self.num_decoded += other.num_decoded;
        self.dispatched += other.dispatched;
        self.dropped += other.dropped;
        self.hazard_stall += other.hazard_stall;
        self.unit_busy_stall += other.unit_busy_stall;
        self.drain_cycles += other.drain_cycles;
    }
}
