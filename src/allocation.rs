use crate::instruction::UnitType;
use bitvec::{array::BitArray, BitArr};
use smallvec::SmallVec;

/// Identifies an addressable memory region (scratchpad, register file, cim array).
pub type MemoryId = usize;

/// Maximum number of memory ids a core can distinguish.
pub const MAX_MEMORY_IDS: usize = 64;

pub type MemoryIdBits = BitArr!(for MAX_MEMORY_IDS, in u64);

/// A set of memory ids.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoryIdSet(MemoryIdBits);

impl Default for MemoryIdSet {
    fn default() -> Self {
        Self(BitArray::ZERO)
    }
}

impl std::fmt::Debug for MemoryIdSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl MemoryIdSet {
    /// Inserts `id`, returning `false` if it is out of range.
    pub fn insert(&mut self, id: MemoryId) -> bool {
        if id >= MAX_MEMORY_IDS {
            log::warn!("memory id {id} exceeds the maximum of {MAX_MEMORY_IDS} ids and is ignored");
            return false;
        }
        self.0.set(id, true);
        true
    }

    #[must_use]
    pub fn contains(&self, id: MemoryId) -> bool {
        self.0.get(id).is_some_and(|bit| *bit)
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.0.iter_ones().any(|id| other.contains(id))
    }

    pub fn union_with(&mut self, other: &Self) {
        for id in other.0.iter_ones() {
            self.0.set(id, true);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.not_any()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones()
    }

    pub fn iter(&self) -> impl Iterator<Item = MemoryId> + '_ {
        self.0.iter_ones()
    }
}

impl FromIterator<MemoryId> for MemoryIdSet {
    fn from_iter<I: IntoIterator<Item = MemoryId>>(iter: I) -> Self {
        let mut set = Self::default();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// The memory footprint of one in-flight instruction.
///
/// The `used` set is maintained as the union of `read` and `write` and can
/// only be extended through [`ResourceAllocation::add_read`],
/// [`ResourceAllocation::add_write`] and the `+=` merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAllocation {
    instruction_id: i64,
    unit_type: UnitType,
    functor: Option<String>,
    read: MemoryIdSet,
    write: MemoryIdSet,
    used: MemoryIdSet,
}

impl Default for ResourceAllocation {
    fn default() -> Self {
        Self::new(-1, UnitType::None)
    }
}

impl std::fmt::Display for ResourceAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Allocation(id={}, {}, read={:?}, write={:?}",
            self.instruction_id, self.unit_type, self.read, self.write
        )?;
        if let Some(functor) = &self.functor {
            write!(f, ", functor={functor}")?;
        }
        write!(f, ")")
    }
}

impl ResourceAllocation {
    #[must_use]
    pub fn new(instruction_id: i64, unit_type: UnitType) -> Self {
        Self {
            instruction_id,
            unit_type,
            functor: None,
            read: MemoryIdSet::default(),
            write: MemoryIdSet::default(),
            used: MemoryIdSet::default(),
        }
    }

    /// Adds memory ids read by the instruction.
    ///
    /// Accepts anything iterable, so an `Option<MemoryId>` from a failed
    /// address lookup simply adds nothing.
    pub fn add_read(&mut self, ids: impl IntoIterator<Item = MemoryId>) -> &mut Self {
        for id in ids {
            if self.read.insert(id) {
                self.used.insert(id);
            }
        }
        self
    }

    /// Adds memory ids written by the instruction.
    pub fn add_write(&mut self, ids: impl IntoIterator<Item = MemoryId>) -> &mut Self {
        for id in ids {
            if self.write.insert(id) {
                self.used.insert(id);
            }
        }
        self
    }

    pub fn add_read_write(&mut self, ids: impl IntoIterator<Item = MemoryId>) -> &mut Self {
        for id in ids {
            self.add_read(Some(id));
            self.add_write(Some(id));
        }
        self
    }

    pub fn set_functor(&mut self, functor: impl Into<String>) -> &mut Self {
        self.functor = Some(functor.into());
        self
    }

    #[must_use]
    pub fn instruction_id(&self) -> i64 {
        self.instruction_id
    }

    #[must_use]
    pub fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    #[must_use]
    pub fn functor(&self) -> Option<&str> {
        self.functor.as_deref()
    }

    #[must_use]
    pub fn read(&self) -> &MemoryIdSet {
        &self.read
    }

    #[must_use]
    pub fn write(&self) -> &MemoryIdSet {
        &self.write
    }

    #[must_use]
    pub fn used(&self) -> &MemoryIdSet {
        &self.used
    }

    /// Checks whether `candidate` may not issue while `self` is in flight.
    ///
    /// Units of the same type only order a pending write before a later read.
    /// Units of different types have no ordering between them, so any shared
    /// memory id conflicts. SIMD and reduce units additionally cannot switch
    /// functors while an instruction is in flight.
    #[must_use]
    pub fn conflicts_with(&self, candidate: &ResourceAllocation) -> bool {
        if self.unit_type.has_functor()
            && self.unit_type == candidate.unit_type
            && self.functor != candidate.functor
        {
            return true;
        }
        if self.unit_type == candidate.unit_type {
            self.write.intersects(&candidate.read)
        } else {
            self.used.intersects(&candidate.used)
        }
    }
}

impl std::ops::AddAssign<&ResourceAllocation> for ResourceAllocation {
    fn add_assign(&mut self, other: &ResourceAllocation) {
        self.unit_type = other.unit_type;
        self.read.union_with(&other.read);
        self.write.union_with(&other.write);
        self.used.union_with(&other.used);
        if other.functor.is_some() {
            self.functor.clone_from(&other.functor);
        }
    }
}

/// Instructions whose resources are no longer held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRelease {
    pub instruction_ids: SmallVec<[i64; 4]>,
}

impl ResourceRelease {
    pub fn push(&mut self, instruction_id: i64) {
        self.instruction_ids.push(instruction_id);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruction_ids.is_empty()
    }
}
