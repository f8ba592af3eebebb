use serde::{Deserialize, Serialize};

/// Destination of an instruction.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    strum::EnumIter,
    strum::EnumCount,
    strum::Display,
    strum::IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    #[default]
    None,
    Scalar,
    Simd,
    Reduce,
    Transfer,
    CimCompute,
    CimControl,
    /// Jumps and branches, resolved entirely by the decoder.
    Control,
}

impl UnitType {
    /// Whether instructions of this type are executed by a registered unit.
    #[must_use]
    pub fn is_execute_unit(self) -> bool {
        !matches!(self, Self::None | Self::Control)
    }

    /// Whether the unit is configured with a functor per instruction.
    #[must_use]
    pub fn has_functor(self) -> bool {
        matches!(self, Self::Simd | Self::Reduce)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionDescriptor {
    pub pc: i64,
    pub id: i64,
    pub unit_type: UnitType,
}

impl Default for InstructionDescriptor {
    fn default() -> Self {
        Self {
            pc: -1,
            id: -1,
            unit_type: UnitType::None,
        }
    }
}

impl InstructionDescriptor {
    #[must_use]
    pub fn valid(&self) -> bool {
        self.pc >= 0 && self.id >= 0
    }
}

impl std::fmt::Display for InstructionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[pc={}, id={}]", self.unit_type, self.pc, self.id)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScalarFunct {
    Add,
    Sub,
    Mul,
    Div,
    Sll,
    Srl,
    Sra,
    Mod,
    Min,
    Max,
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Lt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarOp {
    Alu(ScalarFunct),
    Lui,
    Load,
    Store,
    Assign,
}

impl std::fmt::Display for ScalarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alu(funct) => funct.fmt(f),
            Self::Lui => write!(f, "lui"),
            Self::Load => write!(f, "load"),
            Self::Store => write!(f, "store"),
            Self::Assign => write!(f, "assign"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarPayload {
    pub op: ScalarOp,
    pub src1: i32,
    pub src2: i32,
    pub offset: i32,
    pub dst: usize,
    pub write_special: bool,
}

impl ScalarPayload {
    #[must_use]
    pub fn address(&self) -> i64 {
        i64::from(self.src1) + i64::from(self.offset)
    }
}

pub const SIMD_MAX_INPUTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimdPayload {
    pub functor: String,
    pub input_count: usize,
    pub input_addresses: [i64; SIMD_MAX_INPUTS],
    pub input_bit_widths: [i32; SIMD_MAX_INPUTS],
    pub output_address: i64,
    pub output_bit_width: i32,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducePayload {
    pub functor: String,
    pub input_address: i64,
    pub input_bit_width: i32,
    pub output_address: i64,
    pub output_bit_width: i32,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransferKind {
    Local,
    GlobalLoad,
    GlobalStore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPayload {
    pub kind: TransferKind,
    pub src_address: i64,
    pub dst_address: i64,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CimComputePayload {
    pub input_address: i64,
    pub input_len: usize,
    pub input_bit_width: i32,
    pub activation_group_num: usize,
    pub group_input_step: i64,
    pub row: i32,
    pub value_sparse: bool,
    pub value_sparse_mask_address: i64,
    pub bit_sparse: bool,
    pub bit_sparse_meta_address: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CimControlOp {
    SetActivation,
    OnlyOutput,
    OutputSum,
    OutputSumMove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CimControlPayload {
    pub op: CimControlOp,
    pub group_broadcast: bool,
    pub group_id: i32,
    pub mask_address: i64,
    pub activation_group_num: usize,
    pub output_address: i64,
    pub output_count_per_group: usize,
    pub output_bit_width: i32,
    pub output_mask_address: i64,
}

/// Decoded operands of an instruction, one variant per execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Scalar(ScalarPayload),
    Simd(SimdPayload),
    Reduce(ReducePayload),
    Transfer(TransferPayload),
    CimCompute(CimComputePayload),
    CimControl(CimControlPayload),
}

impl Payload {
    #[must_use]
    pub fn unit_type(&self) -> UnitType {
        match self {
            Self::Scalar(_) => UnitType::Scalar,
            Self::Simd(_) => UnitType::Simd,
            Self::Reduce(_) => UnitType::Reduce,
            Self::Transfer(_) => UnitType::Transfer,
            Self::CimCompute(_) => UnitType::CimCompute,
            Self::CimControl(_) => UnitType::CimControl,
        }
    }
}

/// What an execution unit sees on its input port in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub descriptor: InstructionDescriptor,
    pub payload: Option<Payload>,
}

impl Dispatch {
    #[must_use]
    pub fn null(descriptor: InstructionDescriptor) -> Self {
        Self {
            descriptor,
            payload: None,
        }
    }
}

/// An instruction as stored in a program file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// `rd = rs <funct> rt`
    ScRr {
        funct: ScalarFunct,
        rs: usize,
        rt: usize,
        rd: usize,
    },
    /// `rd = rs <funct> imm`
    ScRi {
        funct: ScalarFunct,
        rs: usize,
        rd: usize,
        imm: i32,
    },
    /// `rd = mem[rs + imm]`
    ScLd { rs: usize, rd: usize, imm: i32 },
    /// `mem[rs + imm] = rt`
    ScSt { rs: usize, rt: usize, imm: i32 },
    /// `rd = imm << 16`
    Lui { rd: usize, imm: i32 },
    /// general register `rd = imm`
    GLi { rd: usize, imm: i32 },
    /// special register `rd = imm`
    SLi { rd: usize, imm: i32 },
    /// special register `rd` = general register `rs`
    GsMov { rs: usize, rd: usize },
    /// general register `rd` = special register `rs`
    SgMov { rs: usize, rd: usize },
    VecOp {
        functor: String,
        input_count: usize,
        rs: usize,
        #[serde(default)]
        rt: usize,
        rd: usize,
        re: usize,
    },
    Reduce {
        functor: String,
        rs: usize,
        rd: usize,
        re: usize,
    },
    MemCpy {
        rs: usize,
        rt: usize,
        rd: usize,
        #[serde(default)]
        imm: i32,
        #[serde(default)]
        offset_source: bool,
        #[serde(default)]
        offset_destination: bool,
    },
    CimMvm {
        rs: usize,
        rt: usize,
        re: usize,
        #[serde(default)]
        value_sparse: bool,
        #[serde(default)]
        bit_sparse: bool,
    },
    CimCfg {
        rs: usize,
        rt: usize,
        #[serde(default)]
        group_broadcast: bool,
    },
    CimOut {
        rs: usize,
        rt: usize,
        rd: usize,
        #[serde(default)]
        sum: bool,
        #[serde(default)]
        sum_move: bool,
    },
    Jmp { imm: i64 },
    Beq { rs: usize, rt: usize, imm: i64 },
    Bne { rs: usize, rt: usize, imm: i64 },
    Bgt { rs: usize, rt: usize, imm: i64 },
    Blt { rs: usize, rt: usize, imm: i64 },
}

impl Instruction {
    /// Unit the instruction is meant for, before operands are resolved.
    #[must_use]
    pub fn unit_type(&self) -> UnitType {
        match self {
            Self::ScRr { .. }
            | Self::ScRi { .. }
            | Self::ScLd { .. }
            | Self::ScSt { .. }
            | Self::Lui { .. }
            | Self::GLi { .. }
            | Self::SLi { .. }
            | Self::GsMov { .. }
            | Self::SgMov { .. } => UnitType::Scalar,
            Self::VecOp { .. } => UnitType::Simd,
            Self::Reduce { .. } => UnitType::Reduce,
            Self::MemCpy { .. } => UnitType::Transfer,
            Self::CimMvm { .. } => UnitType::CimCompute,
            Self::CimCfg { .. } | Self::CimOut { .. } => UnitType::CimControl,
            Self::Jmp { .. }
            | Self::Beq { .. }
            | Self::Bne { .. }
            | Self::Bgt { .. }
            | Self::Blt { .. } => UnitType::Control,
        }
    }
}
