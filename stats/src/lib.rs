pub mod instructions;
pub mod scheduler;
pub mod sim;
pub mod units;

pub use instructions::Instructions;
pub use scheduler::Scheduler;
pub use sim::Sim;
pub use units::{PerUnit, Unit};

use serde::{Deserialize, Serialize};

/// Statistics of a single core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    pub core_id: usize,
    /// Cycle in which every unit of the core reported its run finished.
    pub finish_cycle: Option<u64>,
    pub scheduler: Scheduler,
    pub instructions: Instructions,
    pub units: PerUnit,
}

impl Core {
    #[must_use]
    pub fn new(core_id: usize) -> Self {
        Self {
            core_id,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub sim: Sim,
    pub cores: Vec<Core>,
}

impl Stats {
    #[must_use]
    pub fn new(num_cores: usize) -> Self {
        Self {
            sim: Sim::default(),
            cores: (0..num_cores).map(Core::new).collect(),
        }
    }

    /// Scheduler statistics summed over all cores.
    #[must_use]
    pub fn scheduler_total(&self) -> Scheduler {
        let mut total = Scheduler::default();
        for core in &self.cores {
            total += core.scheduler.clone();
        }
        total
    }

    /// Instruction counts summed over all cores.
    #[must_use]
    pub fn instructions_total(&self) -> Instructions {
        let mut total = Instructions::default();
        for core in &self.cores {
            total += core.instructions.clone();
        }
        total
    }

    /// Unit statistics summed over all cores.
    #[must_use]
    pub fn units_total(&self) -> PerUnit {
        let mut total = PerUnit::default();
        for core in &self.cores {
            total += core.units.clone();
        }
        total
    }
}
