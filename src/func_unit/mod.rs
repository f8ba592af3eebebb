pub mod cim_compute;
pub mod cim_control;
pub mod pipeline;
pub mod reduce;
pub mod scalar;
pub mod simd;
pub mod transfer;

pub use cim_compute::CimComputeUnit;
pub use cim_control::CimControlUnit;
pub use pipeline::{Batch, BatchPipeline, PipelinedUnit, Plan};
pub use reduce::ReduceUnit;
pub use scalar::ScalarUnit;
pub use simd::SimdUnit;
pub use transfer::TransferUnit;

use crate::allocation::{ResourceAllocation, ResourceRelease};
use crate::instruction::{Dispatch, InstructionDescriptor, Payload, UnitType};
use console::style;

/// Signals a unit raised for its hazard detector since they were last taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    pub allocations: Vec<ResourceAllocation>,
    pub release: ResourceRelease,
}

impl Signals {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty() && self.release.is_empty()
    }
}

/// An execution unit.
///
/// Units receive work from the core scheduler, report their readiness and
/// the memory footprint of admitted instructions, and signal completion.
/// They have no say in scheduling decisions.
pub trait ExecuteUnit:
    crate::engine::cycle::Component + Send + std::fmt::Display + std::fmt::Debug + 'static
{
    fn base(&self) -> &Base;
    fn base_mut(&mut self) -> &mut Base;

    /// Memory footprint of an instruction destined for this unit.
    fn resource_allocation(
        &self,
        descriptor: &InstructionDescriptor,
        _payload: &Payload,
    ) -> ResourceAllocation {
        ResourceAllocation::new(descriptor.id, descriptor.unit_type)
    }

    fn unit_type(&self) -> UnitType {
        self.base().unit_type
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn ready(&self) -> bool {
        self.base().ready()
    }

    /// Input port, driven by the core every cycle.
    fn issue(&mut self, dispatch: Dispatch, enabled: bool) {
        self.base_mut().issue(dispatch, enabled);
    }

    fn take_signals(&mut self) -> Signals {
        self.base_mut().take_signals()
    }

    /// The core decoded its last instruction.
    fn decode_finished(&mut self) {
        self.base_mut().decode_finished();
    }

    fn run_finished(&self) -> bool {
        self.base().run_finished()
    }

    fn stats(&self) -> &stats::Unit {
        &self.base().stats
    }
}

/// State every execution unit shares.
#[derive(Debug, Clone)]
pub struct Base {
    pub name: String,
    pub unit_type: UnitType,
    input: Option<(InstructionDescriptor, Payload)>,
    ready: bool,
    running: usize,
    decode_finished: bool,
    run_finished: bool,
    signals: Signals,
    pub stats: stats::Unit,
}

impl Base {
    #[must_use]
    pub fn new(name: impl Into<String>, unit_type: UnitType) -> Self {
        Self {
            name: name.into(),
            unit_type,
            input: None,
            ready: true,
            running: 0,
            decode_finished: false,
            run_finished: false,
            signals: Signals::default(),
            stats: stats::Unit::default(),
        }
    }

    /// Whether a dispatch is meant for this unit.
    #[must_use]
    pub fn accepts(&self, dispatch: &Dispatch, enabled: bool) -> bool {
        enabled
            && dispatch.descriptor.valid()
            && dispatch
                .payload
                .as_ref()
                .is_some_and(|payload| payload.unit_type() == self.unit_type)
    }

    pub fn issue(&mut self, dispatch: Dispatch, enabled: bool) {
        if !self.accepts(&dispatch, enabled) {
            return;
        }
        let Dispatch {
            descriptor,
            payload,
        } = dispatch;
        let Some(payload) = payload else {
            return;
        };
        if let Some((pending, _)) = &self.input {
            log::warn!(
                "{}: dropping {} while {} is still waiting for admission",
                self.name,
                descriptor,
                pending
            );
            return;
        }
        self.input = Some((descriptor, payload));
    }

    /// False while the issue stage still holds an instruction.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready && self.input.is_none()
    }

    /// Takes the latched instruction and marks the unit busy.
    pub fn admit(&mut self) -> Option<(InstructionDescriptor, Payload)> {
        let (descriptor, payload) = self.input.take()?;
        self.ready = false;
        self.running += 1;
        self.stats.admitted += 1;
        log::debug!(
            "{} {}",
            style(format!("{}: admit", self.name)).cyan(),
            descriptor
        );
        Some((descriptor, payload))
    }

    /// Undoes an admission for an instruction the unit cannot execute.
    pub fn reject(&mut self, descriptor: &InstructionDescriptor, cycle: u64) {
        log::warn!("{}: cannot execute {}", self.name, descriptor);
        self.ready = true;
        self.finish_instruction(descriptor, cycle);
    }

    pub fn allocate(&mut self, allocation: ResourceAllocation) {
        self.signals.allocations.push(allocation);
    }

    pub fn ready_for_next(&mut self) {
        self.ready = true;
    }

    pub fn release(&mut self, instruction_id: i64) {
        self.signals.release.push(instruction_id);
    }

    pub fn finish_instruction(&mut self, descriptor: &InstructionDescriptor, cycle: u64) {
        debug_assert!(self.running > 0);
        self.running = self.running.saturating_sub(1);
        self.stats.finished += 1;
        log::debug!(
            "{} {}",
            style(format!("cycle {cycle:03} {}: finish", self.name)).green(),
            descriptor
        );
        self.check_run_finished();
    }

    pub fn decode_finished(&mut self) {
        self.decode_finished = true;
        self.check_run_finished();
    }

    fn check_run_finished(&mut self) {
        if !self.run_finished && self.decode_finished && self.running == 0 && self.input.is_none()
        {
            log::debug!("{}: run finished", self.name);
            self.run_finished = true;
        }
    }

    #[must_use]
    pub fn run_finished(&self) -> bool {
        self.run_finished
    }

    #[must_use]
    pub fn running(&self) -> usize {
        self.running
    }

    pub fn take_signals(&mut self) -> Signals {
        std::mem::take(&mut self.signals)
    }

    /// Per-cycle bookkeeping.
    pub fn tick(&mut self) {
        if self.running > 0 {
            self.stats.busy_cycles += 1;
        }
    }
}
