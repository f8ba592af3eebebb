use crate::address_space::AddressSpace;
use crate::allocation::ResourceAllocation;
use crate::config;
use crate::func_unit::{self as fu, Batch, Plan};
use crate::instruction::{InstructionDescriptor, Payload, ReducePayload, UnitType};
use crate::sync::Arc;

#[must_use]
pub fn resource_allocation(
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &ReducePayload,
) -> ResourceAllocation {
    let mut allocation = ResourceAllocation::new(descriptor.id, descriptor.unit_type);
    allocation
        .add_read(address_space.local_memory_id(payload.input_address))
        .add_write(address_space.local_memory_id(payload.output_address))
        .set_functor(payload.functor.clone());
    allocation
}

fn plan(
    config: &config::ReduceUnit,
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &ReducePayload,
) -> Option<Plan<()>> {
    let Some(functor) = config.functor(&payload.functor) else {
        log::warn!("reduce: unknown functor {:?}", payload.functor);
        return None;
    };
    let allocation = resource_allocation(address_space, descriptor, payload);
    let use_pipeline = config.pipeline && !allocation.write().intersects(allocation.read());
    let batches = Batch::split(
        *descriptor,
        utils::div_ceil(payload.len, config.inputs_per_batch),
        &[config.read_latency, functor.latency, config.write_latency],
        |_| (),
    );
    Some(Plan {
        allocation,
        batches,
        use_pipeline,
    })
}

/// Reduces a vector to a scalar, `inputs_per_batch` elements at a time.
pub struct ReduceUnit {
    inner: fu::PipelinedUnit<()>,
    config: Arc<config::Chip>,
    address_space: Arc<AddressSpace>,
}

impl ReduceUnit {
    #[must_use]
    pub fn new(config: Arc<config::Chip>, address_space: Arc<AddressSpace>) -> Self {
        let base = fu::Base::new("reduce", UnitType::Reduce);
        Self {
            inner: fu::PipelinedUnit::new(base, &["read", "compute", "write"]),
            config,
            address_space,
        }
    }
}

impl std::fmt::Display for ReduceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReduceUnit")
    }
}

impl std::fmt::Debug for ReduceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReduceUnit")
            .field("running", &self.inner.base.running())
            .finish()
    }
}

impl fu::ExecuteUnit for ReduceUnit {
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
            Payload::Reduce(payload) => {
                resource_allocation(&self.address_space, descriptor, payload)
            }
            _ => ResourceAllocation::new(descriptor.id, descriptor.unit_type),
        }
    }
}

impl crate::engine::cycle::Component for ReduceUnit {
    fn cycle(&mut self, cycle: u64) {
        let Self {
            ref mut inner,
            ref config,
            ref address_space,
        } = *self;
        inner.cycle_with(
            cycle,
            |descriptor, payload| match payload {
                Payload::Reduce(payload) => {
                    plan(&config.reduce, address_space, descriptor, &payload)
                }
                _ => None,
            },
            |_| {},
        );
    }
}
