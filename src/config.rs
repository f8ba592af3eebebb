use crate::allocation::MAX_MEMORY_IDS;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("clock period must be positive")]
    ZeroPeriod,
    #[error("simulation time must be positive and finite, got {0} ms")]
    InvalidSimTime(f64),
    #[error("chip needs at least one core")]
    NoCores,
    #[error("address space is empty")]
    EmptyAddressSpace,
    #[error("address space region {0:?} is defined more than once")]
    DuplicateRegion(String),
    #[error("address space region {0:?} has size zero")]
    EmptyRegion(String),
    #[error("address space regions add up to more than {max} bytes")]
    AddressSpaceTooLarge { max: u64 },
    #[error("{count} local memories and the register file exceed the limit of {max} memory ids")]
    TooManyMemories { count: usize, max: usize },
    #[error("cim memory {0:?} is not a local address space region")]
    MissingCimMemory(String),
    #[error("{unit} unit: {field} must be positive")]
    ZeroWidth {
        unit: &'static str,
        field: &'static str,
    },
    #[error("{unit} functor {name:?} has invalid input count {input_count}")]
    InvalidFunctor {
        unit: &'static str,
        name: String,
        input_count: usize,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Open(#[from] utils::fs::Error),
    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config")]
    Invalid(#[from] Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sim {
    /// Clock period in ns.
    pub period_ns: u64,
    /// Deadline of the simulation in ms of simulated time.
    pub sim_time_ms: f64,
}

impl Default for Sim {
    fn default() -> Self {
        Self {
            period_ns: 1,
            sim_time_ms: 1.0,
        }
    }
}

impl Sim {
    /// Number of clock cycles until the deadline.
    #[must_use]
    pub fn max_cycles(&self) -> u64 {
        let period_ns = self.period_ns.max(1) as f64;
        (self.sim_time_ms * 1_000_000.0 / period_ns).ceil() as u64
    }
}

/// A named region of the address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Global regions are shared by all cores.
    #[serde(default)]
    pub global: bool,
}

impl Region {
    #[must_use]
    pub fn local(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            global: false,
        }
    }

    #[must_use]
    pub fn global(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            global: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Functor {
    pub name: String,
    pub input_count: usize,
    /// Cycles one batch spends in the compute stage.
    #[serde(default = "default_latency")]
    pub latency: u64,
}

impl Functor {
    #[must_use]
    pub fn new(name: impl Into<String>, input_count: usize, latency: u64) -> Self {
        Self {
            name: name.into(),
            input_count,
            latency,
        }
    }
}

fn default_latency() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimdUnit {
    /// Elements processed per batch.
    pub lanes: usize,
    pub pipeline: bool,
    pub read_latency: u64,
    pub write_latency: u64,
    pub functors: Vec<Functor>,
}

impl Default for SimdUnit {
    fn default() -> Self {
        Self {
            lanes: 16,
            pipeline: true,
            read_latency: 1,
            write_latency: 1,
            functors: vec![
                Functor::new("vvadd", 2, 1),
                Functor::new("vvmul", 2, 2),
                Functor::new("vsadd", 2, 1),
                Functor::new("relu", 1, 1),
                Functor::new("fma", 3, 3),
            ],
        }
    }
}

impl SimdUnit {
    #[must_use]
    pub fn functor(&self, name: &str, input_count: usize) -> Option<&Functor> {
        self.functors
            .iter()
            .find(|functor| functor.name == name && functor.input_count == input_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceUnit {
    /// Input elements consumed per batch.
    pub inputs_per_batch: usize,
    pub pipeline: bool,
    pub read_latency: u64,
    pub write_latency: u64,
    pub functors: Vec<Functor>,
}

impl Default for ReduceUnit {
    fn default() -> Self {
        Self {
            inputs_per_batch: 16,
            pipeline: true,
            read_latency: 1,
            write_latency: 1,
            functors: vec![Functor::new("sum", 1, 2), Functor::new("max", 1, 2)],
        }
    }
}

impl ReduceUnit {
    #[must_use]
    pub fn functor(&self, name: &str) -> Option<&Functor> {
        self.functors.iter().find(|functor| functor.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferUnit {
    /// Bytes moved per batch of a local copy.
    pub data_width: usize,
    pub pipeline: bool,
    pub read_latency: u64,
    pub write_latency: u64,
    /// Latency of a global load or store, in cycles.
    pub global_latency: u64,
}

impl Default for TransferUnit {
    fn default() -> Self {
        Self {
            data_width: 16,
            pipeline: true,
            read_latency: 1,
            write_latency: 1,
            global_latency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CimUnit {
    /// Address space region holding the macro arrays.
    pub memory: String,
    /// Input elements processed per sub-instruction.
    pub compartments: usize,
    /// Number of macro groups that can be activated at once.
    pub macro_groups: usize,
    pub value_sparse: bool,
    pub bit_sparse: bool,
    /// Latency of reading sparse masks or meta data.
    pub read_latency: u64,
    /// Latency of one macro group computing one sub-instruction.
    pub compute_latency: u64,
    pub set_activation_latency: u64,
    pub output_latency: u64,
}

impl Default for CimUnit {
    fn default() -> Self {
        Self {
            memory: "cim_unit".to_string(),
            compartments: 16,
            macro_groups: 4,
            value_sparse: false,
            bit_sparse: false,
            read_latency: 1,
            compute_latency: 4,
            set_activation_latency: 1,
            output_latency: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chip {
    pub core_count: usize,
    pub address_space: Vec<Region>,
    pub simd: SimdUnit,
    pub reduce: ReduceUnit,
    pub transfer: TransferUnit,
    pub cim: CimUnit,
}

impl Default for Chip {
    fn default() -> Self {
        Self {
            core_count: 1,
            address_space: vec![
                Region::local("local_memory_0", 64 * 1024),
                Region::local("local_memory_1", 64 * 1024),
                Region::local("cim_unit", 64 * 1024),
                Region::global("global", 1024 * 1024),
            ],
            simd: SimdUnit::default(),
            reduce: ReduceUnit::default(),
            transfer: TransferUnit::default(),
            cim: CimUnit::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sim: Sim,
    pub chip: Chip,
}

impl Config {
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let reader = utils::fs::open_readable(path)?;
        Self::from_reader(reader)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let Self { sim, chip } = self;
        if sim.period_ns == 0 {
            return Err(Error::ZeroPeriod);
        }
        if !(sim.sim_time_ms.is_finite() && sim.sim_time_ms > 0.0) {
            return Err(Error::InvalidSimTime(sim.sim_time_ms));
        }
        if chip.core_count == 0 {
            return Err(Error::NoCores);
        }
        if chip.address_space.is_empty() {
            return Err(Error::EmptyAddressSpace);
        }
        for (i, region) in chip.address_space.iter().enumerate() {
            if region.size == 0 {
                return Err(Error::EmptyRegion(region.name.clone()));
            }
            if chip.address_space[..i]
                .iter()
                .any(|other| other.name == region.name)
            {
                return Err(Error::DuplicateRegion(region.name.clone()));
            }
        }
        let max = u64::try_from(i64::MAX).unwrap_or(u64::MAX);
        let total = chip
            .address_space
            .iter()
            .try_fold(0_u64, |total, region| total.checked_add(region.size));
        if total.map_or(true, |total| total > max) {
            return Err(Error::AddressSpaceTooLarge { max });
        }
        let local_count = chip
            .address_space
            .iter()
            .filter(|region| !region.global)
            .count();
        // one extra id is taken by the register file
        if local_count + 1 > MAX_MEMORY_IDS {
            return Err(Error::TooManyMemories {
                count: local_count,
                max: MAX_MEMORY_IDS,
            });
        }
        if !chip
            .address_space
            .iter()
            .any(|region| !region.global && region.name == chip.cim.memory)
        {
            return Err(Error::MissingCimMemory(chip.cim.memory.clone()));
        }

        let widths = [
            ("simd", "lanes", chip.simd.lanes),
            ("reduce", "inputs_per_batch", chip.reduce.inputs_per_batch),
            ("transfer", "data_width", chip.transfer.data_width),
            ("cim", "compartments", chip.cim.compartments),
            ("cim", "macro_groups", chip.cim.macro_groups),
        ];
        if let Some((unit, field, _)) = widths.into_iter().find(|(_, _, width)| *width == 0) {
            return Err(Error::ZeroWidth { unit, field });
        }

        let functors = chip
            .simd
            .functors
            .iter()
            .map(|functor| ("simd", functor, 1..=4))
            .chain(
                chip.reduce
                    .functors
                    .iter()
                    .map(|functor| ("reduce", functor, 1..=1)),
            );
        for (unit, functor, valid) in functors {
            if !valid.contains(&functor.input_count) {
                return Err(Error::InvalidFunctor {
                    unit,
                    name: functor.name.clone(),
                    input_count: functor.input_count,
                });
            }
        }
        Ok(())
    }
}
