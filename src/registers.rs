pub const GENERAL_REGISTER_COUNT: usize = 32;
pub const SPECIAL_REGISTER_COUNT: usize = 32;

/// Special purpose registers configuring the vector and cim units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(usize)]
pub enum SpecialRegister {
    CimInputBitWidth = 0,
    CimOutputBitWidth = 1,
    CimWeightBitWidth = 2,
    GroupSize = 3,
    ActivationGroupNum = 4,
    ActivationElementColNum = 5,
    GroupInputStep = 6,
    ValueSparseMaskAddr = 7,
    BitSparseMetaAddr = 8,
    SimdInput1BitWidth = 16,
    SimdInput2BitWidth = 17,
    SimdInput3BitWidth = 18,
    SimdInput4BitWidth = 19,
    SimdOutputBitWidth = 20,
    Input3Address = 21,
    Input4Address = 22,
}

impl SpecialRegister {
    pub const SIMD_INPUT_BIT_WIDTHS: [Self; 4] = [
        Self::SimdInput1BitWidth,
        Self::SimdInput2BitWidth,
        Self::SimdInput3BitWidth,
        Self::SimdInput4BitWidth,
    ];

    #[must_use]
    pub fn id(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub id: usize,
    pub special: bool,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    general: [i32; GENERAL_REGISTER_COUNT],
    special: [i32; SPECIAL_REGISTER_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            general: [0; GENERAL_REGISTER_COUNT],
            special: [0; SPECIAL_REGISTER_COUNT],
        }
    }
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a register, out of range ids read as zero.
    #[must_use]
    pub fn read(&self, id: usize, special: bool) -> i32 {
        let registers = if special {
            &self.special[..]
        } else {
            &self.general[..]
        };
        match registers.get(id) {
            Some(value) => *value,
            None => {
                log::warn!(
                    "read of invalid {} register {id}",
                    if special { "special" } else { "general" }
                );
                0
            }
        }
    }

    #[must_use]
    pub fn general(&self, id: usize) -> i32 {
        self.read(id, false)
    }

    #[must_use]
    pub fn special(&self, register: SpecialRegister) -> i32 {
        self.read(register.id(), true)
    }

    pub fn write(&mut self, write: RegisterWrite) {
        let registers = if write.special {
            &mut self.special[..]
        } else {
            &mut self.general[..]
        };
        match registers.get_mut(write.id) {
            Some(register) => *register = write.value,
            None => log::warn!("write to invalid register {:?} ignored", write),
        }
    }

    #[must_use]
    pub fn general_registers(&self) -> &[i32] {
        &self.general
    }
}
