use crate::allocation::ResourceAllocation;
use crate::decoder::{Decode, Decoded, ResourceAllocator};
use crate::engine::cycle::Component;
use crate::func_unit::ExecuteUnit;
use crate::hazard::{Access, HazardDetector};
use crate::instruction::{Dispatch, InstructionDescriptor, Payload, UnitType};
use crate::registers::RegisterFile;
use crate::sync::{Arc, Mutex};
use console::style;
use strum::EnumCount;

/// An execution unit as seen by the core scheduler.
#[derive(Debug)]
pub struct Registration {
    pub unit: Box<dyn ExecuteUnit>,
    pub detector: HazardDetector,
    /// Whether the current candidate collides with this unit.
    pub conflict: bool,
}

impl Registration {
    #[must_use]
    pub fn new(unit: Box<dyn ExecuteUnit>) -> Self {
        let detector = HazardDetector::new(unit.unit_type());
        Self {
            unit,
            detector,
            conflict: false,
        }
    }
}

/// Registered units, indexed by unit type.
#[derive(Debug)]
pub struct Units(Box<[Option<Registration>]>);

impl Default for Units {
    fn default() -> Self {
        Self((0..UnitType::COUNT).map(|_| None).collect())
    }
}

impl Units {
    #[must_use]
    pub fn get(&self, unit_type: UnitType) -> Option<&Registration> {
        self.0.get(unit_type.index())?.as_ref()
    }

    pub fn get_mut(&mut self, unit_type: UnitType) -> Option<&mut Registration> {
        self.0.get_mut(unit_type.index())?.as_mut()
    }

    /// Registers `unit` for its unit type, returning a unit it replaced.
    pub fn insert(&mut self, unit: Box<dyn ExecuteUnit>) -> Option<Box<dyn ExecuteUnit>> {
        let slot = self.0.get_mut(unit.unit_type().index())?;
        slot.replace(Registration::new(unit))
            .map(|registration| registration.unit)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> + '_ {
        self.0.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Registration> + '_ {
        self.0.iter_mut().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceAllocator for Units {
    fn resource_allocation(
        &self,
        descriptor: &InstructionDescriptor,
        payload: &Payload,
    ) -> Option<ResourceAllocation> {
        let registration = self.get(descriptor.unit_type)?;
        Some(registration.unit.resource_allocation(descriptor, payload))
    }
}

/// Issue scheduler of one core.
///
/// Instructions are decoded one at a time and dispatched in program order.
/// A decoded candidate waits until no hazard detector reports a conflict,
/// then exactly one unit receives its payload.
pub struct Core<I> {
    core_id: usize,
    instructions: Vec<I>,
    decoder: Box<dyn Decode<I> + Send>,
    registers: Arc<Mutex<RegisterFile>>,
    units: Units,
    pc: i64,
    candidate: Option<Decoded>,
    stall: bool,
    program_finished: bool,
    finished: bool,
    stats: stats::Core,
}

impl<I> std::fmt::Debug for Core<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("core_id", &self.core_id)
            .field("pc", &self.pc)
            .field(
                "candidate",
                &self.candidate.as_ref().map(Decoded::descriptor),
            )
            .field("stall", &self.stall)
            .field("program_finished", &self.program_finished)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<I> Core<I> {
    #[must_use]
    pub fn new(
        core_id: usize,
        instructions: Vec<I>,
        decoder: Box<dyn Decode<I> + Send>,
        registers: Arc<Mutex<RegisterFile>>,
    ) -> Self {
        Self {
            core_id,
            instructions,
            decoder,
            registers,
            units: Units::default(),
            pc: 0,
            candidate: None,
            stall: false,
            program_finished: false,
            finished: false,
            stats: stats::Core::new(core_id),
        }
    }

    /// Registers an execution unit.
    ///
    /// A unit registered for a type that already has one replaces it.
    pub fn register_unit(&mut self, unit: Box<dyn ExecuteUnit>) {
        let unit_type = unit.unit_type();
        if !unit_type.is_execute_unit() {
            log::warn!(
                "core {}: cannot register {unit} for unit type {unit_type}",
                self.core_id
            );
            return;
        }
        if let Some(replaced) = self.units.insert(unit) {
            log::warn!(
                "core {}: {replaced} replaced by a new {unit_type} unit",
                self.core_id
            );
        }
    }

    #[must_use]
    pub fn core_id(&self) -> usize {
        self.core_id
    }

    #[must_use]
    pub fn pc(&self) -> i64 {
        self.pc
    }

    #[must_use]
    pub fn candidate(&self) -> Option<&Decoded> {
        self.candidate.as_ref()
    }

    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stall
    }

    #[must_use]
    pub fn program_finished(&self) -> bool {
        self.program_finished
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn units(&self) -> &Units {
        &self.units
    }

    #[must_use]
    pub fn registers(&self) -> &Arc<Mutex<RegisterFile>> {
        &self.registers
    }

    /// Current values of the general purpose registers.
    #[must_use]
    pub fn general_registers(&self) -> Vec<i32> {
        self.registers.lock().general_registers().to_vec()
    }

    /// Statistics of the scheduler and all registered units.
    #[must_use]
    pub fn stats(&self) -> stats::Core {
        let mut stats = self.stats.clone();
        stats.instructions = self.decoder.instruction_stats();
        for registration in self.units.iter() {
            let unit = &registration.unit;
            stats.units.insert(unit.name(), unit.stats().clone());
        }
        stats
    }

    /// Steps all units and feeds their signals into their hazard detectors.
    fn cycle_units(&mut self, cycle: u64) {
        for registration in self.units.iter_mut() {
            registration.unit.cycle(cycle);
            let signals = registration.unit.take_signals();
            for allocation in signals.allocations {
                registration.detector.allocate(allocation);
            }
            registration
                .detector
                .release_all(&signals.release.instruction_ids);
        }
    }

    fn finish_decoding(&mut self, cycle: u64) {
        log::info!(
            "{} decoded {} instructions",
            style(format!("cycle {cycle:03} core {}: program finished", self.core_id)).green(),
            self.stats.scheduler.num_decoded
        );
        self.program_finished = true;
        for registration in self.units.iter_mut() {
            registration.unit.decode_finished();
        }
    }

    /// Evaluates every detector against the current candidate.
    fn detect_conflicts(&mut self) -> bool {
        let Some(candidate) = &self.candidate else {
            for registration in self.units.iter_mut() {
                registration.conflict = false;
            }
            return false;
        };
        let mut any_conflict = false;
        let mut memory_hazard = false;
        for registration in self.units.iter_mut() {
            let ready = registration.unit.ready();
            registration.conflict = registration
                .detector
                .has_collision(&candidate.allocation, ready);
            if registration.conflict {
                memory_hazard |= registration
                    .detector
                    .has_memory_collision(&candidate.allocation);
                log::trace!(
                    "core {}: {} conflicts with {} (ready={ready})",
                    self.core_id,
                    candidate.descriptor(),
                    registration.unit
                );
            }
            any_conflict |= registration.conflict;
        }
        if memory_hazard {
            self.stats.scheduler.hazard_stall += 1;
        } else if any_conflict {
            self.stats.scheduler.unit_busy_stall += 1;
        }
        any_conflict
    }

    /// Sends the payload to the destination unit and null to all others.
    fn dispatch(&mut self, candidate: Decoded, cycle: u64) {
        let Decoded {
            dispatch,
            pc_increment,
            ..
        } = candidate;
        let Dispatch {
            descriptor,
            mut payload,
        } = dispatch;
        let target = descriptor.unit_type;

        if target == UnitType::Control {
            log::debug!(
                "{} {} (pc += {pc_increment})",
                style(format!("cycle {cycle:03} core {}: resolved", self.core_id)).yellow(),
                descriptor
            );
        } else if payload.is_none() || self.units.get(target).is_none() {
            log::warn!(
                "core {}: dropping {} without a matching execution unit",
                self.core_id,
                descriptor
            );
            self.stats.scheduler.dropped += 1;
        } else {
            log::debug!(
                "{} {}",
                style(format!("cycle {cycle:03} core {}: dispatch", self.core_id)).cyan(),
                descriptor
            );
            for registration in self.units.iter_mut() {
                let dispatch = if registration.unit.unit_type() == target {
                    Dispatch {
                        descriptor,
                        payload: payload.take(),
                    }
                } else {
                    Dispatch::null(descriptor)
                };
                registration.unit.issue(dispatch, true);
            }
            self.stats.scheduler.dispatched += 1;
        }
        // a pc outside the program ends decoding
        self.pc = self.pc.saturating_add(pc_increment);
    }

    fn check_finished(&mut self, cycle: u64) {
        if !self.program_finished {
            return;
        }
        if self.units.iter().all(|registration| registration.unit.run_finished()) {
            log::info!(
                "{}",
                style(format!("cycle {cycle:03} core {}: finished", self.core_id)).green()
            );
            self.finished = true;
            self.stats.finish_cycle = Some(cycle);
        } else {
            self.stats.scheduler.drain_cycles += 1;
        }
    }
}

impl<I> Component for Core<I> {
    #[tracing::instrument(name = "core_cycle")]
    fn cycle(&mut self, cycle: u64) {
        if self.finished {
            return;
        }
        log::debug!(
            "{} \tpc={}, candidate={:?}, stall={}",
            style(format!("cycle {cycle:03} core {}: core cycle", self.core_id)).blue(),
            self.pc,
            self.candidate.as_ref().map(|candidate| candidate.descriptor().to_string()),
            self.stall,
        );

        self.cycle_units(cycle);

        if self.candidate.is_none() && !self.program_finished {
            let raw = usize::try_from(self.pc)
                .ok()
                .and_then(|pc| self.instructions.get(pc));
            match raw {
                Some(raw) => {
                    let decoded = self.decoder.decode(raw, self.pc, &self.units);
                    self.stats.scheduler.num_decoded += 1;
                    self.candidate = Some(decoded);
                }
                None => self.finish_decoding(cycle),
            }
        }

        let conflict = self.detect_conflicts();
        self.stall = self.program_finished || conflict;

        match self.candidate.take() {
            Some(candidate) if !self.stall => self.dispatch(candidate, cycle),
            Some(candidate) => {
                log::debug!(
                    "core {}: {} stalled",
                    self.core_id,
                    candidate.descriptor()
                );
                for registration in self.units.iter_mut() {
                    registration.unit.issue(Dispatch::default(), false);
                }
                self.candidate = Some(candidate);
            }
            None => {}
        }

        self.check_finished(cycle);
    }
}
