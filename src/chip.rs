use crate::address_space::AddressSpace;
use crate::clock::Clock;
use crate::config;
use crate::core::Core;
use crate::decoder::Decoder;
use crate::engine::cycle::Component;
use crate::func_unit as fu;
use crate::instruction::Instruction;
use crate::memory::{Memory, MemoryPort};
use crate::program::Program;
use crate::registers::RegisterFile;
use crate::sync::{Arc, Mutex};
use console::style;
use itertools::Itertools;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("program has instructions for {programs} cores but the chip has {cores}")]
    TooManyPrograms { programs: usize, cores: usize },
    #[error("core {0} does not exist")]
    NoSuchCore(usize),
    #[error("core {core_id}: register {register} is {actual}, expected {expected}")]
    RegisterMismatch {
        core_id: usize,
        register: usize,
        expected: i32,
        actual: i32,
    },
}

/// Builds a core with one unit of every execution unit type.
#[must_use]
pub fn build_core(
    core_id: usize,
    instructions: Vec<Instruction>,
    config: &Arc<config::Chip>,
    address_space: &Arc<AddressSpace>,
    global_memory: &Arc<Mutex<Memory>>,
) -> Core<Instruction> {
    let local_memory = Memory::new(
        format!("core {core_id} local memory"),
        address_space.regions().filter(|region| !region.global),
    );
    let memory = MemoryPort::new(
        Arc::clone(address_space),
        Arc::new(Mutex::new(local_memory)),
        Arc::clone(global_memory),
    );
    let registers = Arc::new(Mutex::new(RegisterFile::new()));
    let decoder = Decoder::new(
        Arc::clone(&registers),
        Arc::clone(address_space),
        Arc::clone(config),
    );

    let mut core = Core::new(
        core_id,
        instructions,
        Box::new(decoder),
        Arc::clone(&registers),
    );
    core.register_unit(Box::new(fu::ScalarUnit::new(memory.clone(), registers)));
    core.register_unit(Box::new(fu::SimdUnit::new(
        Arc::clone(config),
        Arc::clone(address_space),
    )));
    core.register_unit(Box::new(fu::ReduceUnit::new(
        Arc::clone(config),
        Arc::clone(address_space),
    )));
    core.register_unit(Box::new(fu::TransferUnit::new(Arc::clone(config), memory)));
    core.register_unit(Box::new(fu::CimComputeUnit::new(
        Arc::clone(config),
        Arc::clone(address_space),
    )));
    core.register_unit(Box::new(fu::CimControlUnit::new(
        Arc::clone(config),
        Arc::clone(address_space),
    )));
    core
}

/// A set of cores driven by a shared clock.
#[derive(Debug)]
pub struct Chip<I = Instruction> {
    sim: config::Sim,
    cores: Vec<Core<I>>,
}

impl Chip<Instruction> {
    /// Builds the chip and loads one program per core.
    ///
    /// Cores without a program finish right away.
    pub fn new(config: &config::Config, program: Program) -> Result<Self, Error> {
        let core_count = config.chip.core_count;
        if program.cores.len() > core_count {
            return Err(Error::TooManyPrograms {
                programs: program.cores.len(),
                cores: core_count,
            });
        }
        let chip_config = Arc::new(config.chip.clone());
        let address_space = Arc::new(AddressSpace::new(&chip_config.address_space));
        let global_memory = Arc::new(Mutex::new(Memory::new(
            "global memory",
            address_space.regions().filter(|region| region.global),
        )));

        let mut programs = program.cores.into_iter();
        let cores = (0..core_count)
            .map(|core_id| {
                let instructions = programs.next().unwrap_or_default();
                build_core(
                    core_id,
                    instructions,
                    &chip_config,
                    &address_space,
                    &global_memory,
                )
            })
            .collect();
        Ok(Self::from_cores(config.sim.clone(), cores))
    }
}

impl<I> Chip<I> {
    #[must_use]
    pub fn from_cores(sim: config::Sim, cores: Vec<Core<I>>) -> Self {
        Self { sim, cores }
    }

    #[must_use]
    pub fn cores(&self) -> &[Core<I>] {
        &self.cores
    }

    #[must_use]
    pub fn core(&self, core_id: usize) -> Option<&Core<I>> {
        self.cores.iter().find(|core| core.core_id() == core_id)
    }

    pub fn core_mut(&mut self, core_id: usize) -> Option<&mut Core<I>> {
        self.cores.iter_mut().find(|core| core.core_id() == core_id)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cores.iter().all(Core::is_finished)
    }

    /// Runs until every core finished or the simulated time is up.
    pub fn run(&mut self) -> stats::Stats {
        let clock = Clock::init(self.sim.period_ns);
        self.run_with(clock)
    }

    /// Runs the chip on `clock`.
    ///
    /// Every core waits on the next positive edge until it finished.
    #[tracing::instrument(name = "chip_run", skip_all)]
    pub fn run_with(&mut self, mut clock: Clock) -> stats::Stats {
        let max_cycles = self.sim.max_cycles();
        let mut deadline_reached = false;

        for (waker, core) in self.cores.iter().enumerate() {
            if !core.is_finished() {
                clock.notify_next_pos_edge(waker);
            }
        }

        while clock.has_waiting() {
            if clock.cycle() >= max_cycles {
                log::warn!(
                    "deadline of {} ms reached after {} cycles, unfinished cores: [{}]",
                    self.sim.sim_time_ms,
                    clock.cycle(),
                    self.cores
                        .iter()
                        .filter(|core| !core.is_finished())
                        .map(Core::core_id)
                        .join(", ")
                );
                deadline_reached = true;
                break;
            }

            let woken = clock.tick();
            let cycle = clock.cycle();
            debug_assert!(clock.is_pos_edge(), "cores only step on a positive edge");
            log::debug!("{}", style(format!("======== cycle {cycle} ========")).bold());

            for waker in woken {
                let Some(core) = self.cores.get_mut(waker) else {
                    continue;
                };
                core.cycle(cycle);
                if !core.is_finished() {
                    clock.notify_next_pos_edge(waker);
                }
            }
            clock.end_pos_edge();
            debug_assert!(!clock.is_pos_edge());
        }

        let cycles = clock.cycle();
        let period_ns = clock.period_ns();
        let elapsed_ns = clock.teardown();

        let mut stats = stats::Stats::new(self.cores.len());
        stats.sim = stats::Sim {
            cycles,
            period_ns,
            elapsed_ns,
            finished_cores: self.cores.iter().filter(|core| core.is_finished()).count(),
            deadline_reached,
        };
        stats.cores = self.cores.iter().map(Core::stats).collect();
        log::info!(
            "simulated {cycles} cycles ({elapsed_ns} ns), {}/{} cores finished",
            stats.sim.finished_cores,
            self.cores.len()
        );
        stats
    }

    /// Checks the leading general purpose registers of a core.
    pub fn verify_registers(&self, core_id: usize, expected: &[i32]) -> Result<(), Error> {
        let core = self.core(core_id).ok_or(Error::NoSuchCore(core_id))?;
        let actual = core.general_registers();
        for (register, &expected) in expected.iter().enumerate() {
            let actual = actual.get(register).copied().unwrap_or_default();
            if actual != expected {
                return Err(Error::RegisterMismatch {
                    core_id,
                    register,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Chip, Error};
    use crate::config;
    use crate::instruction::{Instruction, ScalarFunct};
    use crate::program::Program;

    fn config(core_count: usize) -> config::Config {
        config::Config {
            chip: config::Chip {
                core_count,
                ..config::Chip::default()
            },
            ..config::Config::default()
        }
    }

    #[test]
    fn too_many_programs() {
        let program = Program::new(vec![vec![], vec![]]);
        let err = Chip::new(&config(1), program).unwrap_err();
        assert_eq!(
            err,
            Error::TooManyPrograms {
                programs: 2,
                cores: 1
            }
        );
    }

    #[test]
    fn cores_without_program_finish() {
        crate::testing::init_logging();
        let mut chip = Chip::new(&config(2), Program::default()).unwrap();
        let stats = chip.run();
        assert!(chip.is_finished());
        assert_eq!(stats.sim.finished_cores, 2);
        assert!(!stats.sim.deadline_reached);
        assert_eq!(stats.cores[1].finish_cycle, Some(1));
    }

    #[test]
    fn runs_scalar_program() {
        crate::testing::init_logging();
        let program = Program::new(vec![vec![
            Instruction::GLi { rd: 1, imm: 5 },
            Instruction::GLi { rd: 2, imm: 7 },
            Instruction::ScRr {
                funct: ScalarFunct::Add,
                rs: 1,
                rt: 2,
                rd: 3,
            },
        ]]);
        let mut chip = Chip::new(&config(1), program).unwrap();
        let stats = chip.run();
        assert!(chip.is_finished());
        assert_eq!(stats.cores[0].scheduler.dispatched, 3);
        chip.verify_registers(0, &[0, 5, 7, 12]).unwrap();
        assert_eq!(
            chip.verify_registers(0, &[0, 5, 7, 13]),
            Err(Error::RegisterMismatch {
                core_id: 0,
                register: 3,
                expected: 13,
                actual: 12
            })
        );
        assert_eq!(chip.verify_registers(4, &[]), Err(Error::NoSuchCore(4)));
    }

    #[test]
    fn jump_out_of_range_ends_program() {
        crate::testing::init_logging();
        let program = Program::new(vec![
            vec![Instruction::GLi { rd: 1, imm: 5 }, Instruction::Jmp { imm: i64::MAX }],
            vec![
                Instruction::GLi { rd: 1, imm: 5 },
                Instruction::GLi { rd: 2, imm: 5 },
                Instruction::Beq {
                    rs: 1,
                    rt: 2,
                    imm: i64::MIN,
                },
                Instruction::GLi { rd: 3, imm: 1 },
            ],
        ]);
        let mut chip = Chip::new(&config(2), program).unwrap();
        let stats = chip.run();
        assert!(chip.is_finished());
        assert!(!stats.sim.deadline_reached);
        assert_eq!(chip.core(0).map(|core| core.pc()), Some(i64::MAX));
        assert!(chip.core(1).is_some_and(|core| core.pc() < 0));
        chip.verify_registers(0, &[0, 5]).unwrap();
        chip.verify_registers(1, &[0, 5, 5, 0]).unwrap();
    }

    #[test]
    fn deadline_stops_endless_loop() {
        crate::testing::init_logging();
        let mut config = config(1);
        config.sim = config::Sim {
            period_ns: 1000,
            sim_time_ms: 0.1,
        };
        let program = Program::new(vec![vec![Instruction::Jmp { imm: 0 }]]);
        let mut chip = Chip::new(&config, program).unwrap();
        let stats = chip.run();
        assert!(stats.sim.deadline_reached);
        assert_eq!(stats.sim.cycles, 100);
        assert_eq!(stats.sim.elapsed_ns, 100_000);
        assert_eq!(stats.sim.finished_cores, 0);
        assert_eq!(stats.cores[0].finish_cycle, None);
    }
}
