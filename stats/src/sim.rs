use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sim {
    pub cycles: u64,
    pub period_ns: u64,
    /// Simulated time until the last core finished (or the deadline hit).
    pub elapsed_ns: u64,
    pub finished_cores: usize,
    pub deadline_reached: bool,
}
