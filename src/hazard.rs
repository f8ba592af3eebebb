use crate::allocation::{MemoryId, ResourceAllocation};
use crate::instruction::UnitType;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Hazard detector access.
///
/// The hazard detector keeps track of the memory footprint of all
/// instructions in flight on one execution unit.
pub trait Access {
    /// Checks whether a candidate instruction collides with any in-flight instruction.
    ///
    /// `unit_ready` is the readiness of the unit owning this detector. A candidate
    /// destined for a unit that is not ready always collides.
    #[must_use]
    fn has_collision(&self, candidate: &ResourceAllocation, unit_ready: bool) -> bool;

    /// Track the footprint of an admitted instruction.
    fn allocate(&mut self, allocation: ResourceAllocation);

    /// Stop tracking an instruction.
    fn release(&mut self, instruction_id: i64);

    /// Stop tracking a list of instructions.
    fn release_all(&mut self, instruction_ids: &[i64]) {
        for &id in instruction_ids {
            self.release(id);
        }
    }
}

/// Hazard detector for one execution unit.
#[derive(Debug, Clone)]
pub struct HazardDetector {
    unit_type: UnitType,
    in_flight: IndexMap<i64, ResourceAllocation>,
    per_memory: BTreeMap<MemoryId, ResourceAllocation>,
    total: ResourceAllocation,
}

impl HazardDetector {
    #[must_use]
    pub fn new(unit_type: UnitType) -> Self {
        Self {
            unit_type,
            in_flight: IndexMap::new(),
            per_memory: BTreeMap::new(),
            total: ResourceAllocation::default(),
        }
    }

    #[must_use]
    pub fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    #[must_use]
    pub fn num_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn is_tracked(&self, instruction_id: i64) -> bool {
        self.in_flight.contains_key(&instruction_id)
    }

    /// Aggregated footprint of all in-flight instructions using `memory_id`.
    #[must_use]
    pub fn memory(&self, memory_id: MemoryId) -> Option<&ResourceAllocation> {
        self.per_memory.get(&memory_id)
    }

    /// Checks only the memory footprint, ignoring unit readiness.
    #[must_use]
    pub fn has_memory_collision(&self, candidate: &ResourceAllocation) -> bool {
        if !candidate.unit_type().is_execute_unit() || self.in_flight.is_empty() {
            return false;
        }
        if self.total.unit_type().has_functor()
            && self.total.unit_type() == candidate.unit_type()
            && self.total.functor() != candidate.functor()
        {
            log::trace!(
                "hazard[{}]: functor {:?} in flight, candidate needs {:?}",
                self.unit_type,
                self.total.functor(),
                candidate.functor(),
            );
            return true;
        }
        candidate.used().iter().any(|memory_id| {
            self.per_memory
                .get(&memory_id)
                .is_some_and(|in_flight| in_flight.conflicts_with(candidate))
        })
    }

    fn merge(&mut self, allocation: &ResourceAllocation) {
        for memory_id in allocation.used().iter() {
            *self.per_memory.entry(memory_id).or_default() += allocation;
        }
        self.total += allocation;
    }

    fn recompute(&mut self) {
        self.per_memory.clear();
        self.total = ResourceAllocation::default();
        let in_flight = std::mem::take(&mut self.in_flight);
        for allocation in in_flight.values() {
            self.merge(allocation);
        }
        self.in_flight = in_flight;
    }
}

impl Access for HazardDetector {
    fn has_collision(&self, candidate: &ResourceAllocation, unit_ready: bool) -> bool {
        if !candidate.unit_type().is_execute_unit() {
            return false;
        }
        let busy = candidate.unit_type() == self.unit_type && !unit_ready;
        let collision = busy || self.has_memory_collision(candidate);
        if collision {
            log::trace!(
                "hazard[{}]: {} collides (busy={}, in flight={:?})",
                self.unit_type,
                candidate,
                busy,
                self.in_flight.keys().collect::<Vec<_>>(),
            );
        }
        collision
    }

    fn allocate(&mut self, allocation: ResourceAllocation) {
        let id = allocation.instruction_id();
        if id < 0 || self.in_flight.contains_key(&id) {
            return;
        }
        log::trace!("hazard[{}]: allocate {}", self.unit_type, allocation);
        self.merge(&allocation);
        self.in_flight.insert(id, allocation);
    }

    fn release(&mut self, instruction_id: i64) {
        // a release can only shrink the aggregate, which cannot be subtracted
        // since in-flight instructions may share memory ids
        if self.in_flight.shift_remove(&instruction_id).is_some() {
            log::trace!("hazard[{}]: release {}", self.unit_type, instruction_id);
            self.recompute();
        }
    }
}
