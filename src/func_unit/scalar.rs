use crate::address_space::AddressSpace;
use crate::allocation::ResourceAllocation;
use crate::func_unit as fu;
use crate::instruction::{InstructionDescriptor, Payload, ScalarFunct, ScalarOp, ScalarPayload};
use crate::memory::MemoryPort;
use crate::registers::{RegisterFile, RegisterWrite};
use crate::socket::{self, StageSocket};
use crate::sync::{Arc, Mutex};
use std::task::Poll;

/// Evaluates a scalar ALU operation with two's complement wrap around.
///
/// Division and modulo by zero yield zero.
#[must_use]
pub fn alu(funct: ScalarFunct, lhs: i32, rhs: i32) -> i32 {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    let shift = (rhs & 0x1f) as u32;
    match funct {
        ScalarFunct::Add => lhs.wrapping_add(rhs),
        ScalarFunct::Sub => lhs.wrapping_sub(rhs),
        ScalarFunct::Mul => lhs.wrapping_mul(rhs),
        ScalarFunct::Div | ScalarFunct::Mod if rhs == 0 => {
            log::warn!("scalar: {funct} by zero ({lhs} {funct} {rhs}) yields 0");
            0
        }
        ScalarFunct::Div => lhs.wrapping_div(rhs),
        ScalarFunct::Mod => lhs.wrapping_rem(rhs),
        ScalarFunct::Sll => lhs.wrapping_shl(shift),
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
        ScalarFunct::Srl => ((lhs as u32) >> shift) as i32,
        ScalarFunct::Sra => lhs >> shift,
        ScalarFunct::Min => lhs.min(rhs),
        ScalarFunct::Max => lhs.max(rhs),
        ScalarFunct::And => lhs & rhs,
        ScalarFunct::Or => lhs | rhs,
        ScalarFunct::Eq => i32::from(lhs == rhs),
        ScalarFunct::Ne => i32::from(lhs != rhs),
        ScalarFunct::Gt => i32::from(lhs > rhs),
        ScalarFunct::Lt => i32::from(lhs < rhs),
    }
}

/// Memory footprint of a scalar instruction.
///
/// Register writes are tracked on the register file pseudo memory.
#[must_use]
pub fn resource_allocation(
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &ScalarPayload,
) -> ResourceAllocation {
    let mut allocation = ResourceAllocation::new(descriptor.id, descriptor.unit_type);
    let register_file = address_space.register_file_memory_id();
    match payload.op {
        ScalarOp::Store => {
            allocation.add_write(address_space.local_memory_id(payload.address()));
        }
        ScalarOp::Load => {
            allocation
                .add_read(address_space.local_memory_id(payload.address()))
                .add_write(Some(register_file));
        }
        ScalarOp::Alu(_) | ScalarOp::Lui | ScalarOp::Assign => {
            allocation.add_write(Some(register_file));
        }
    }
    allocation
}

/// Scalar ALU and load/store unit.
///
/// Instructions execute in a single stage. Resources are released as soon as
/// the stage starts. Stores complete immediately, everything else one cycle later.
pub struct ScalarUnit {
    base: fu::Base,
    execute: StageSocket<InstructionDescriptor>,
    memory: MemoryPort,
    registers: Arc<Mutex<RegisterFile>>,
    pending: Option<ScalarPayload>,
}

impl ScalarUnit {
    #[must_use]
    pub fn new(memory: MemoryPort, registers: Arc<Mutex<RegisterFile>>) -> Self {
        Self {
            base: fu::Base::new("scalar", crate::instruction::UnitType::Scalar),
            execute: StageSocket::new(),
            memory,
            registers,
            pending: None,
        }
    }

    fn execute(&self, payload: &ScalarPayload) {
        let value = match payload.op {
            ScalarOp::Store => {
                self.memory.write_word(payload.address(), payload.src2);
                return;
            }
            ScalarOp::Load => self.memory.read_word(payload.address()),
            ScalarOp::Alu(funct) => alu(funct, payload.src1, payload.src2),
            ScalarOp::Lui => payload.src2.wrapping_shl(16),
            ScalarOp::Assign => payload.src1,
        };
        self.registers.lock().write(RegisterWrite {
            id: payload.dst,
            special: payload.write_special,
            value,
        });
    }
}

impl std::fmt::Display for ScalarUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScalarUnit")
    }
}

impl std::fmt::Debug for ScalarUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarUnit")
            .field("running", &self.base.running())
            .field("execute", &self.execute.payload())
            .finish()
    }
}

impl fu::ExecuteUnit for ScalarUnit {
    fn base(&self) -> &fu::Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut fu::Base {
        &mut self.base
    }

    fn resource_allocation(
        &self,
        descriptor: &InstructionDescriptor,
        payload: &Payload,
    ) -> ResourceAllocation {
        match payload {
            Payload::Scalar(payload) => {
                resource_allocation(self.memory.address_space(), descriptor, payload)
            }
            _ => ResourceAllocation::new(descriptor.id, descriptor.unit_type),
        }
    }
}

impl crate::engine::cycle::Component for ScalarUnit {
    fn cycle(&mut self, cycle: u64) {
        // the instruction started last cycle completes
        if self.execute.is_busy() {
            if let Some(descriptor) = self.execute.finish() {
                self.base.finish_instruction(&descriptor, cycle);
            }
        }

        if self.execute.poll_finish_if_busy().is_ready() {
            if let Some((descriptor, payload)) = self.base.admit() {
                match payload {
                    Payload::Scalar(payload) => {
                        self.base.allocate(resource_allocation(
                            self.memory.address_space(),
                            &descriptor,
                            &payload,
                        ));
                        self.pending = Some(payload);
                        if socket::send_and_start_next(descriptor, &mut self.execute).is_ok() {
                            self.base.ready_for_next();
                        }
                    }
                    _ => self.base.reject(&descriptor, cycle),
                }
            }
        }

        if let Poll::Ready(descriptor) = self.execute.poll_start() {
            let descriptor = *descriptor;
            if let Some(payload) = self.pending.take() {
                log::debug!(
                    "cycle {cycle:03} scalar: {} {} (src1={}, src2={}, dst={})",
                    payload.op,
                    descriptor,
                    payload.src1,
                    payload.src2,
                    payload.dst
                );
                self.execute(&payload);
                self.base.release(descriptor.id);
                if payload.op == ScalarOp::Store {
                    self.execute.finish();
                    self.base.finish_instruction(&descriptor, cycle);
                }
            }
        }

        self.base.tick();
    }
}
