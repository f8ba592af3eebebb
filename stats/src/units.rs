use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub admitted: u64,
    pub finished: u64,
    pub batches: u64,
    /// Cycles with at least one instruction running.
    pub busy_cycles: u64,
}

impl std::ops::AddAssign for Unit {
    fn add_assign(&mut self, other: Self) {
        self.admitted += other.admitted;
        self.finished += other.finished;
        self.batches += other.batches;
        self.busy_cycles += other.busy_cycles;
    }
}

/// Unit statistics keyed by unit name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerUnit(pub BTreeMap<String, Unit>);

impl PerUnit {
    #[must_use]
    pub fn get(&self, unit: &str) -> Option<&Unit> {
        self.0.get(unit)
    }

    pub fn get_mut(&mut self, unit: &str) -> &mut Unit {
        self.0.entry(unit.to_string()).or_default()
    }

    pub fn insert(&mut self, unit: impl Into<String>, stats: Unit) {
        self.0.insert(unit.into(), stats);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Unit)> + '_ {
        self.0.iter()
    }
}

impl std::ops::AddAssign for PerUnit {
    fn add_assign(&mut self, other: Self) {
        for (unit, stats) in other.0 {
            *self.0.entry(unit).or_default() += stats;
        }
    }
}
