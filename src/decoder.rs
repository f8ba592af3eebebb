use crate::address_space::AddressSpace;
use crate::allocation::ResourceAllocation;
use crate::config;
use crate::instruction::{
    CimComputePayload, CimControlOp, CimControlPayload, Dispatch, Instruction,
    InstructionDescriptor, Payload, ReducePayload, ScalarOp, ScalarPayload, SimdPayload,
    TransferKind, TransferPayload, UnitType, SIMD_MAX_INPUTS,
};
use crate::registers::{RegisterFile, SpecialRegister};
use crate::sync::{Arc, Mutex};
use console::style;

/// A decoded instruction waiting for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub dispatch: Dispatch,
    pub pc_increment: i64,
    pub allocation: ResourceAllocation,
}

impl Decoded {
    #[must_use]
    pub fn descriptor(&self) -> &InstructionDescriptor {
        &self.dispatch.descriptor
    }
}

/// Looks up the memory footprint of an instruction at its destination unit.
pub trait ResourceAllocator {
    /// Returns `None` if no unit of the destination type is registered.
    fn resource_allocation(
        &self,
        descriptor: &InstructionDescriptor,
        payload: &Payload,
    ) -> Option<ResourceAllocation>;
}

/// Turns a raw instruction into a dispatchable one.
pub trait Decode<I> {
    fn decode(&mut self, raw: &I, pc: i64, units: &dyn ResourceAllocator) -> Decoded;

    /// Counts of the instructions decoded so far.
    fn instruction_stats(&self) -> stats::Instructions {
        stats::Instructions::default()
    }
}

/// Decodes program instructions.
///
/// Register operands are resolved at decode time, so the decoded payload
/// carries addresses and lengths rather than register ids.
#[derive(Debug)]
pub struct Decoder {
    next_id: i64,
    stats: stats::Instructions,
    registers: Arc<Mutex<RegisterFile>>,
    address_space: Arc<AddressSpace>,
    config: Arc<config::Chip>,
}

fn length(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

impl Decoder {
    #[must_use]
    pub fn new(
        registers: Arc<Mutex<RegisterFile>>,
        address_space: Arc<AddressSpace>,
        config: Arc<config::Chip>,
    ) -> Self {
        Self {
            next_id: 0,
            stats: stats::Instructions::default(),
            registers,
            address_space,
            config,
        }
    }

    /// Number of instructions decoded so far.
    #[must_use]
    pub fn num_decoded(&self) -> i64 {
        self.next_id
    }

    fn count(&mut self, raw: &Instruction, payload: Option<&Payload>) {
        let stats = &mut self.stats;
        stats.total += 1;
        match raw {
            Instruction::ScRr { .. } => stats.scalar.rr += 1,
            Instruction::ScRi { .. } => stats.scalar.ri += 1,
            Instruction::ScLd { .. } => stats.scalar.load += 1,
            Instruction::ScSt { .. } => stats.scalar.store += 1,
            Instruction::Lui { .. } => stats.scalar.lui += 1,
            Instruction::GLi { .. } => stats.scalar.general_li += 1,
            Instruction::SLi { .. } => stats.scalar.special_li += 1,
            Instruction::GsMov { .. } | Instruction::SgMov { .. } => {
                stats.scalar.special_general_assign += 1;
            }
            Instruction::VecOp { functor, .. } => stats.simd.add(functor),
            Instruction::Reduce { functor, .. } => stats.reduce.add(functor),
            Instruction::MemCpy { .. } => {
                stats.transfer.total += 1;
                if let Some(Payload::Transfer(TransferPayload { kind, .. })) = payload {
                    match kind {
                        TransferKind::Local => stats.transfer.local += 1,
                        TransferKind::GlobalLoad => stats.transfer.global_load += 1,
                        TransferKind::GlobalStore => stats.transfer.global_store += 1,
                    }
                }
            }
            Instruction::CimMvm { .. } => stats.cim.compute += 1,
            Instruction::CimCfg { .. } => stats.cim.set += 1,
            Instruction::CimOut { .. } => stats.cim.output += 1,
            Instruction::Jmp { .. } => stats.control.jump += 1,
            Instruction::Beq { .. }
            | Instruction::Bne { .. }
            | Instruction::Bgt { .. }
            | Instruction::Blt { .. } => stats.control.branch += 1,
        }
        match raw.unit_type() {
            UnitType::Scalar => stats.scalar.total += 1,
            UnitType::CimCompute | UnitType::CimControl => stats.cim.total += 1,
            UnitType::Control => stats.control.total += 1,
            _ => {}
        }
    }

    /// Resolves the operands of `raw`.
    ///
    /// Returns the destination unit, the payload and the pc increment.
    #[allow(clippy::too_many_lines)]
    fn resolve(&self, raw: &Instruction) -> (UnitType, Option<Payload>, i64) {
        let registers = self.registers.lock();
        let g = |id: usize| registers.general(id);
        let s = |register: SpecialRegister| registers.special(register);
        let scalar = |op, src1, src2, offset, dst, write_special| {
            (
                UnitType::Scalar,
                Some(Payload::Scalar(ScalarPayload {
                    op,
                    src1,
                    src2,
                    offset,
                    dst,
                    write_special,
                })),
                1_i64,
            )
        };
        let branch = |taken: bool, imm: i64| (UnitType::Control, None, if taken { imm } else { 1 });

        match *raw {
            Instruction::ScRr { funct, rs, rt, rd } => {
                scalar(ScalarOp::Alu(funct), g(rs), g(rt), 0, rd, false)
            }
            Instruction::ScRi { funct, rs, rd, imm } => {
                scalar(ScalarOp::Alu(funct), g(rs), imm, 0, rd, false)
            }
            Instruction::ScLd { rs, rd, imm } => scalar(ScalarOp::Load, g(rs), 0, imm, rd, false),
            Instruction::ScSt { rs, rt, imm } => {
                scalar(ScalarOp::Store, g(rs), g(rt), imm, 0, false)
            }
            Instruction::Lui { rd, imm } => scalar(ScalarOp::Lui, 0, imm, 0, rd, false),
            Instruction::GLi { rd, imm } => scalar(ScalarOp::Assign, imm, 0, 0, rd, false),
            Instruction::SLi { rd, imm } => scalar(ScalarOp::Assign, imm, 0, 0, rd, true),
            Instruction::GsMov { rs, rd } => scalar(ScalarOp::Assign, g(rs), 0, 0, rd, true),
            Instruction::SgMov { rs, rd } => {
                scalar(ScalarOp::Assign, registers.read(rs, true), 0, 0, rd, false)
            }
            Instruction::VecOp {
                ref functor,
                input_count,
                rs,
                rt,
                rd,
                re,
            } => {
                if !(1..=SIMD_MAX_INPUTS).contains(&input_count)
                    || self.config.simd.functor(functor, input_count).is_none()
                {
                    log::warn!(
                        "decode: simd functor {functor:?} with {input_count} inputs is not supported"
                    );
                    return (UnitType::None, None, 1);
                }
                let input_addresses = [
                    i64::from(g(rs)),
                    i64::from(g(rt)),
                    i64::from(s(SpecialRegister::Input3Address)),
                    i64::from(s(SpecialRegister::Input4Address)),
                ];
                let input_bit_widths = SpecialRegister::SIMD_INPUT_BIT_WIDTHS.map(s);
                let payload = SimdPayload {
                    functor: functor.clone(),
                    input_count,
                    input_addresses,
                    input_bit_widths,
                    output_address: i64::from(g(rd)),
                    output_bit_width: s(SpecialRegister::SimdOutputBitWidth),
                    len: length(g(re)),
                };
                (UnitType::Simd, Some(Payload::Simd(payload)), 1)
            }
            Instruction::Reduce {
                ref functor,
                rs,
                rd,
                re,
            } => {
                if self.config.reduce.functor(functor).is_none() {
                    log::warn!("decode: reduce functor {functor:?} is not supported");
                    return (UnitType::None, None, 1);
                }
                let payload = ReducePayload {
                    functor: functor.clone(),
                    input_address: i64::from(g(rs)),
                    input_bit_width: s(SpecialRegister::SimdInput1BitWidth),
                    output_address: i64::from(g(rd)),
                    output_bit_width: s(SpecialRegister::SimdOutputBitWidth),
                    len: length(g(re)),
                };
                (UnitType::Reduce, Some(Payload::Reduce(payload)), 1)
            }
            Instruction::MemCpy {
                rs,
                rt,
                rd,
                imm,
                offset_source,
                offset_destination,
            } => {
                let offset = |enabled: bool| if enabled { i64::from(imm) } else { 0 };
                let src_address = i64::from(g(rs)) + offset(offset_source);
                let dst_address = i64::from(g(rd)) + offset(offset_destination);
                let kind = match (
                    self.address_space.is_global(src_address),
                    self.address_space.is_global(dst_address),
                ) {
                    (false, false) => TransferKind::Local,
                    (true, false) => TransferKind::GlobalLoad,
                    (false, true) => TransferKind::GlobalStore,
                    (true, true) => {
                        log::warn!(
                            "decode: copy from {src_address} to {dst_address} stays in global memory"
                        );
                        return (UnitType::None, None, 1);
                    }
                };
                let payload = TransferPayload {
                    kind,
                    src_address,
                    dst_address,
                    size: length(g(rt)),
                };
                (UnitType::Transfer, Some(Payload::Transfer(payload)), 1)
            }
            Instruction::CimMvm {
                rs,
                rt,
                re,
                value_sparse,
                bit_sparse,
            } => {
                let payload = CimComputePayload {
                    input_address: i64::from(g(rs)),
                    input_len: length(g(rt)),
                    input_bit_width: s(SpecialRegister::CimInputBitWidth),
                    activation_group_num: length(s(SpecialRegister::ActivationGroupNum)),
                    group_input_step: i64::from(s(SpecialRegister::GroupInputStep)),
                    row: g(re),
                    value_sparse,
                    value_sparse_mask_address: i64::from(s(SpecialRegister::ValueSparseMaskAddr)),
                    bit_sparse,
                    bit_sparse_meta_address: i64::from(s(SpecialRegister::BitSparseMetaAddr)),
                };
                (UnitType::CimCompute, Some(Payload::CimCompute(payload)), 1)
            }
            Instruction::CimCfg {
                rs,
                rt,
                group_broadcast,
            } => {
                let payload = CimControlPayload {
                    op: CimControlOp::SetActivation,
                    group_broadcast,
                    group_id: g(rs),
                    mask_address: i64::from(g(rt)),
                    activation_group_num: length(s(SpecialRegister::ActivationGroupNum)),
                    output_address: 0,
                    output_count_per_group: 0,
                    output_bit_width: 0,
                    output_mask_address: 0,
                };
                (UnitType::CimControl, Some(Payload::CimControl(payload)), 1)
            }
            Instruction::CimOut {
                rs,
                rt,
                rd,
                sum,
                sum_move,
            } => {
                let op = match (sum, sum_move) {
                    (_, true) => CimControlOp::OutputSumMove,
                    (true, false) => CimControlOp::OutputSum,
                    (false, false) => CimControlOp::OnlyOutput,
                };
                let payload = CimControlPayload {
                    op,
                    group_broadcast: false,
                    group_id: 0,
                    mask_address: 0,
                    activation_group_num: length(s(SpecialRegister::ActivationGroupNum)),
                    output_address: i64::from(g(rd)),
                    output_count_per_group: length(g(rs)),
                    output_bit_width: s(SpecialRegister::CimOutputBitWidth),
                    output_mask_address: i64::from(g(rt)),
                };
                (UnitType::CimControl, Some(Payload::CimControl(payload)), 1)
            }
            Instruction::Jmp { imm } => (UnitType::Control, None, imm),
            Instruction::Beq { rs, rt, imm } => branch(g(rs) == g(rt), imm),
            Instruction::Bne { rs, rt, imm } => branch(g(rs) != g(rt), imm),
            Instruction::Bgt { rs, rt, imm } => branch(g(rs) > g(rt), imm),
            Instruction::Blt { rs, rt, imm } => branch(g(rs) < g(rt), imm),
        }
    }
}

impl Decode<Instruction> for Decoder {
    fn decode(&mut self, raw: &Instruction, pc: i64, units: &dyn ResourceAllocator) -> Decoded {
        let id = self.next_id;
        self.next_id += 1;

        let (unit_type, payload, pc_increment) = self.resolve(raw);
        self.count(raw, payload.as_ref());
        let descriptor = InstructionDescriptor { pc, id, unit_type };
        let allocation = payload
            .as_ref()
            .and_then(|payload| units.resource_allocation(&descriptor, payload))
            .unwrap_or_else(|| ResourceAllocation::new(id, unit_type));
        log::debug!(
            "{} {} => {}",
            style("decode").magenta(),
            descriptor,
            allocation
        );
        Decoded {
            dispatch: Dispatch {
                descriptor,
                payload,
            },
            pc_increment,
            allocation,
        }
    }

    fn instruction_stats(&self) -> stats::Instructions {
        self.stats.clone()
    }
}
