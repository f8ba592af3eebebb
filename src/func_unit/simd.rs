use crate::address_space::AddressSpace;
use crate::allocation::ResourceAllocation;
use crate::config;
use crate::func_unit::{self as fu, Batch, Plan};
use crate::instruction::{InstructionDescriptor, Payload, SimdPayload, UnitType};
use crate::sync::Arc;

#[must_use]
pub fn resource_allocation(
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &SimdPayload,
) -> ResourceAllocation {
    let mut allocation = ResourceAllocation::new(descriptor.id, descriptor.unit_type);
    let input_count = payload.input_count.min(payload.input_addresses.len());
    for &address in &payload.input_addresses[..input_count] {
        allocation.add_read(address_space.local_memory_id(address));
    }
    allocation
        .add_write(address_space.local_memory_id(payload.output_address))
        .set_functor(payload.functor.clone());
    allocation
}

fn plan(
    config: &config::SimdUnit,
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &SimdPayload,
) -> Option<Plan<()>> {
    let Some(functor) = config.functor(&payload.functor, payload.input_count) else {
        log::warn!(
            "simd: unknown functor {:?} with {} inputs",
            payload.functor,
            payload.input_count
        );
        return None;
    };
    let allocation = resource_allocation(address_space, descriptor, payload);
    // in place updates must not overlap
    let use_pipeline = config.pipeline && !allocation.write().intersects(allocation.read());
    let batches = Batch::split(
        *descriptor,
        utils::div_ceil(payload.len, config.lanes),
        &[config.read_latency, functor.latency, config.write_latency],
        |_| (),
    );
    Some(Plan {
        allocation,
        batches,
        use_pipeline,
    })
}

/// Element wise vector unit.
///
/// Vectors are processed `lanes` elements at a time through
/// read, compute and write stages.
pub struct SimdUnit {
    inner: fu::PipelinedUnit<()>,
    config: Arc<config::Chip>,
    address_space: Arc<AddressSpace>,
}

impl SimdUnit {
    #[must_use]
    pub fn new(config: Arc<config::Chip>, address_space: Arc<AddressSpace>) -> Self {
        let base = fu::Base::new("simd", UnitType::Simd);
        Self {
            inner: fu::PipelinedUnit::new(base, &["read", "compute", "write"]),
            config,
            address_space,
        }
    }
}

impl std::fmt::Display for SimdUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimdUnit")
    }
}

impl std::fmt::Debug for SimdUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimdUnit")
            .field("lanes", &self.config.simd.lanes)
            .field("running", &self.inner.base.running())
            .finish()
    }
}

impl fu::ExecuteUnit for SimdUnit {
    fn base(&self) -> &fu::Base {
        &self.inner.base
    }

    fn base_mut(&mut self) -> &mut fu::Base {
        &mut self.inner.base
    }

    fn resource_allocation(
        &self,
        descriptor: &InstructionDescriptor,
        payload: &Payload,
    ) -> ResourceAllocation {
        match payload {
            Payload::Simd(payload) => resource_allocation(&self.address_space, descriptor, payload),
            _ => ResourceAllocation::new(descriptor.id, descriptor.unit_type),
        }
    }
}

impl crate::engine::cycle::Component for SimdUnit {
    fn cycle(&mut self, cycle: u64) {
        let Self {
            ref mut inner,
            ref config,
            ref address_space,
        } = *self;
        inner.cycle_with(
            cycle,
            |descriptor, payload| match payload {
                Payload::Simd(payload) => plan(&config.simd, address_space, descriptor, &payload),
                _ => None,
            },
            |_| {},
        );
    }
}

#[cfg(test)]
mod tests {
    use super::SimdUnit;
    use crate::address_space::AddressSpace;
    use crate::config;
    use crate::engine::cycle::Component;
    use crate::func_unit::ExecuteUnit;
    use crate::instruction::{Dispatch, InstructionDescriptor, Payload, SimdPayload, UnitType};
    use crate::sync::Arc;

    const MEMORY_1: i64 = 64 * 1024;

    fn unit() -> SimdUnit {
        let config = config::Chip::default();
        let address_space = AddressSpace::new(&config.address_space);
        SimdUnit::new(Arc::new(config), Arc::new(address_space))
    }

    fn vvadd(id: i64, output_address: i64, len: usize) -> Dispatch {
        Dispatch {
            descriptor: InstructionDescriptor {
                pc: id,
                id,
                unit_type: UnitType::Simd,
            },
            payload: Some(Payload::Simd(SimdPayload {
                functor: "vvadd".to_string(),
                input_count: 2,
                input_addresses: [0, 128, 0, 0],
                input_bit_widths: [8, 8, 0, 0],
                output_address,
                output_bit_width: 8,
                len,
            })),
        }
    }

    /// Cycles the unit until its running instruction finished.
    fn finish_cycle(unit: &mut SimdUnit) -> Option<u64> {
        (1..100).find(|&cycle| {
            unit.cycle(cycle);
            unit.base().running() == 0
        })
    }

    #[test]
    fn disjoint_memories_overlap_batches() {
        let mut unit = unit();
        unit.issue(vvadd(0, MEMORY_1, 32), true);
        assert_eq!(finish_cycle(&mut unit), Some(5));
        assert_eq!(unit.stats().batches, 2);

        let signals = unit.take_signals();
        let allocation = &signals.allocations[0];
        assert_eq!(allocation.read().iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(allocation.write().iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(allocation.functor(), Some("vvadd"));
        assert_eq!(signals.release.instruction_ids.as_slice(), &[0]);
    }

    #[test]
    fn in_place_update_serializes_batches() {
        let mut unit = unit();
        unit.issue(vvadd(0, 256, 32), true);
        assert_eq!(finish_cycle(&mut unit), Some(7));
    }

    #[test]
    fn ready_once_last_batch_entered_pipeline() {
        let mut unit = unit();
        unit.issue(vvadd(0, MEMORY_1, 32), true);
        unit.cycle(1);
        assert!(!unit.ready());
        unit.cycle(2);
        assert!(unit.ready());
        assert_eq!(unit.base().running(), 1);
    }

    #[test]
    fn unknown_functor_is_rejected() {
        crate::testing::init_logging();
        let mut unit = unit();
        let mut dispatch = vvadd(0, MEMORY_1, 32);
        if let Some(Payload::Simd(payload)) = &mut dispatch.payload {
            payload.functor = "vvdiv".to_string();
        }
        unit.issue(dispatch, true);
        unit.cycle(1);
        assert!(unit.ready());
        assert_eq!(unit.stats().finished, 1);
        assert!(unit.take_signals().is_empty());
    }
}
