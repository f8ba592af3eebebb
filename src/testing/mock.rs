//! Mock execution units and a scripted decoder for scheduler tests.

use crate::allocation::{MemoryId, ResourceAllocation};
use crate::core::Core;
use crate::decoder::{Decode, Decoded, ResourceAllocator};
use crate::engine::cycle::Component;
use crate::func_unit as fu;
use crate::instruction::{
    CimComputePayload, CimControlOp, CimControlPayload, Dispatch, InstructionDescriptor, Payload,
    ReducePayload, ScalarOp, ScalarPayload, SimdPayload, TransferKind, TransferPayload, UnitType,
    SIMD_MAX_INPUTS,
};
use crate::registers::RegisterFile;
use crate::sync::{Arc, Mutex};
use std::collections::{HashMap, VecDeque};

/// A payload accepted by a unit of `unit_type`.
#[must_use]
pub fn payload(unit_type: UnitType) -> Option<Payload> {
    let payload = match unit_type {
        UnitType::Scalar => Payload::Scalar(ScalarPayload {
            op: ScalarOp::Assign,
            src1: 0,
            src2: 0,
            offset: 0,
            dst: 0,
            write_special: false,
        }),
        UnitType::Simd => Payload::Simd(SimdPayload {
            functor: "vvadd".to_string(),
            input_count: 2,
            input_addresses: [0; SIMD_MAX_INPUTS],
            input_bit_widths: [8; SIMD_MAX_INPUTS],
            output_address: 0,
            output_bit_width: 8,
            len: 16,
        }),
        UnitType::Reduce => Payload::Reduce(ReducePayload {
            functor: "sum".to_string(),
            input_address: 0,
            input_bit_width: 8,
            output_address: 0,
            output_bit_width: 32,
            len: 16,
        }),
        UnitType::Transfer => Payload::Transfer(TransferPayload {
            kind: TransferKind::Local,
            src_address: 0,
            dst_address: 0,
            size: 16,
        }),
        UnitType::CimCompute => Payload::CimCompute(CimComputePayload::default()),
        UnitType::CimControl => Payload::CimControl(CimControlPayload {
            op: CimControlOp::SetActivation,
            group_broadcast: false,
            group_id: 0,
            mask_address: 0,
            activation_group_num: 1,
            output_address: 0,
            output_count_per_group: 0,
            output_bit_width: 32,
            output_mask_address: 0,
        }),
        UnitType::None | UnitType::Control => return None,
    };
    Some(payload)
}

/// One input port event seen by a mock unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Issued {
    pub unit_type: UnitType,
    pub instruction_id: i64,
    pub has_payload: bool,
    pub enabled: bool,
}

/// Everything the mock units observed, shared between all units of a core.
#[derive(Debug, Default)]
pub struct Trace {
    pub issued: Vec<Issued>,
    pub started: Vec<(i64, u64)>,
    pub finished: Vec<(i64, u64)>,
}

impl Trace {
    #[must_use]
    pub fn started(&self, instruction_id: i64) -> Option<u64> {
        self.started
            .iter()
            .find(|(id, _)| *id == instruction_id)
            .map(|(_, cycle)| *cycle)
    }

    #[must_use]
    pub fn finished(&self, instruction_id: i64) -> Option<u64> {
        self.finished
            .iter()
            .find(|(id, _)| *id == instruction_id)
            .map(|(_, cycle)| *cycle)
    }

    /// Enabled issues carrying `instruction_id`.
    pub fn dispatches(&self, instruction_id: i64) -> impl Iterator<Item = &Issued> + '_ {
        self.issued
            .iter()
            .filter(move |issued| issued.enabled && issued.instruction_id == instruction_id)
    }
}

pub type Footprints = Arc<HashMap<i64, ResourceAllocation>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSpec {
    pub unit_type: UnitType,
    pub latency: u64,
    /// A pipelined unit takes the next instruction right after admission,
    /// otherwise only after the running one finished.
    pub pipelined: bool,
}

impl UnitSpec {
    #[must_use]
    pub fn new(unit_type: UnitType, latency: u64) -> Self {
        Self {
            unit_type,
            latency,
            pipelined: true,
        }
    }

    #[must_use]
    pub fn blocking(self) -> Self {
        Self {
            pipelined: false,
            ..self
        }
    }
}

/// Execution unit with a fixed latency that does no work.
pub struct MockUnit {
    base: fu::Base,
    spec: UnitSpec,
    footprints: Footprints,
    in_flight: VecDeque<(InstructionDescriptor, u64)>,
    trace: Arc<Mutex<Trace>>,
}

impl MockUnit {
    #[must_use]
    pub fn new(spec: UnitSpec, footprints: Footprints, trace: Arc<Mutex<Trace>>) -> Self {
        Self {
            base: fu::Base::new(spec.unit_type.to_string(), spec.unit_type),
            spec,
            footprints,
            in_flight: VecDeque::new(),
            trace,
        }
    }

    fn footprint(&self, descriptor: &InstructionDescriptor) -> ResourceAllocation {
        self.footprints
            .get(&descriptor.id)
            .cloned()
            .unwrap_or_else(|| ResourceAllocation::new(descriptor.id, descriptor.unit_type))
    }
}

impl std::fmt::Display for MockUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockUnit({})", self.spec.unit_type)
    }
}

impl std::fmt::Debug for MockUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockUnit")
            .field("spec", &self.spec)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl fu::ExecuteUnit for MockUnit {
    fn base(&self) -> &fu::Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut fu::Base {
        &mut self.base
    }

    fn resource_allocation(
        &self,
        descriptor: &InstructionDescriptor,
        _payload: &Payload,
    ) -> ResourceAllocation {
        self.footprint(descriptor)
    }

    fn issue(&mut self, dispatch: Dispatch, enabled: bool) {
        self.trace.lock().issued.push(Issued {
            unit_type: self.spec.unit_type,
            instruction_id: dispatch.descriptor.id,
            has_payload: dispatch.payload.is_some(),
            enabled,
        });
        self.base.issue(dispatch, enabled);
    }
}

impl Component for MockUnit {
    fn cycle(&mut self, cycle: u64) {
        while let Some(&(descriptor, done)) = self.in_flight.front() {
            if done > cycle {
                break;
            }
            self.in_flight.pop_front();
            self.base.release(descriptor.id);
            self.base.finish_instruction(&descriptor, cycle);
            self.trace.lock().finished.push((descriptor.id, cycle));
            if !self.spec.pipelined {
                self.base.ready_for_next();
            }
        }

        if let Some((descriptor, _)) = self.base.admit() {
            let footprint = self.footprint(&descriptor);
            self.base.allocate(footprint);
            self.in_flight
                .push_back((descriptor, cycle + self.spec.latency.max(1)));
            self.trace.lock().started.push((descriptor.id, cycle));
            if self.spec.pipelined {
                self.base.ready_for_next();
            }
        }

        self.base.tick();
    }
}

/// Decoder replaying a fixed list of decoded instructions.
///
/// The raw instruction is the index into the script.
#[derive(Debug, Default)]
pub struct ScriptedDecoder {
    script: Vec<Decoded>,
}

impl Decode<usize> for ScriptedDecoder {
    fn decode(&mut self, raw: &usize, pc: i64, _units: &dyn ResourceAllocator) -> Decoded {
        let mut decoded = self.script.get(*raw).cloned().unwrap_or_else(|| Decoded {
            dispatch: Dispatch::default(),
            pc_increment: 1,
            allocation: ResourceAllocation::default(),
        });
        decoded.dispatch.descriptor.pc = pc;
        decoded
    }
}

/// Builds a core running mock units on a scripted program.
#[derive(Debug, Default)]
pub struct Script {
    decoded: Vec<Decoded>,
}

impl Script {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction with the given footprint, returning its id.
    pub fn push(&mut self, unit_type: UnitType, read: &[MemoryId], write: &[MemoryId]) -> i64 {
        let id = i64::try_from(self.decoded.len()).unwrap_or(i64::MAX);
        let mut allocation = ResourceAllocation::new(id, unit_type);
        allocation
            .add_read(read.iter().copied())
            .add_write(write.iter().copied());
        let payload = payload(unit_type);
        match &payload {
            Some(Payload::Simd(SimdPayload { functor, .. }))
            | Some(Payload::Reduce(ReducePayload { functor, .. })) => {
                allocation.set_functor(functor.clone());
            }
            _ => {}
        }
        self.decoded.push(Decoded {
            dispatch: Dispatch {
                descriptor: InstructionDescriptor {
                    pc: id,
                    id,
                    unit_type,
                },
                payload,
            },
            pc_increment: 1,
            allocation,
        });
        id
    }

    #[must_use]
    pub fn build(self, units: &[UnitSpec]) -> Harness {
        let footprints: Footprints = Arc::new(
            self.decoded
                .iter()
                .map(|decoded| (decoded.descriptor().id, decoded.allocation.clone()))
                .collect(),
        );
        let trace = Arc::new(Mutex::new(Trace::default()));
        let instructions = (0..self.decoded.len()).collect();
        let decoder = ScriptedDecoder {
            script: self.decoded,
        };
        let registers = Arc::new(Mutex::new(RegisterFile::new()));
        let mut core = Core::new(0, instructions, Box::new(decoder), registers);
        for spec in units {
            core.register_unit(Box::new(MockUnit::new(
                *spec,
                Arc::clone(&footprints),
                Arc::clone(&trace),
            )));
        }
        Harness { core, trace }
    }
}

#[derive(Debug)]
pub struct Harness {
    pub core: Core<usize>,
    pub trace: Arc<Mutex<Trace>>,
}

impl Harness {
    /// Steps the core until it finished, returning the finish cycle.
    pub fn run(&mut self, max_cycles: u64) -> Option<u64> {
        (1..=max_cycles).find(|&cycle| {
            self.core.cycle(cycle);
            self.core.is_finished()
        })
    }
}
