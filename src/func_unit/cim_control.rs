use crate::address_space::AddressSpace;
use crate::allocation::ResourceAllocation;
use crate::config;
use crate::func_unit::{self as fu, Batch, Plan};
use crate::instruction::{CimControlOp, CimControlPayload, InstructionDescriptor, Payload, UnitType};
use crate::sync::Arc;

#[must_use]
pub fn resource_allocation(
    config: &config::CimUnit,
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &CimControlPayload,
) -> ResourceAllocation {
    let mut allocation = ResourceAllocation::new(descriptor.id, descriptor.unit_type);
    let cim_memory = address_space.memory_id(&config.memory);
    match payload.op {
        CimControlOp::SetActivation => {
            allocation
                .add_read(address_space.local_memory_id(payload.mask_address))
                .add_read(cim_memory);
        }
        CimControlOp::OnlyOutput | CimControlOp::OutputSumMove => {
            allocation
                .add_read(cim_memory)
                .add_write(address_space.local_memory_id(payload.output_address));
        }
        CimControlOp::OutputSum => {
            allocation
                .add_read(cim_memory)
                .add_read(address_space.local_memory_id(payload.output_mask_address))
                .add_write(address_space.local_memory_id(payload.output_address));
        }
    }
    allocation
}

/// Configures macro group activation and collects results from the macros.
///
/// Every instruction occupies the single execute stage for the latency of its
/// operation.
pub struct CimControlUnit {
    inner: fu::PipelinedUnit<()>,
    config: Arc<config::Chip>,
    address_space: Arc<AddressSpace>,
}

impl CimControlUnit {
    #[must_use]
    pub fn new(config: Arc<config::Chip>, address_space: Arc<AddressSpace>) -> Self {
        let base = fu::Base::new("cim_control", UnitType::CimControl);
        Self {
            inner: fu::PipelinedUnit::new(base, &["execute"]),
            config,
            address_space,
        }
    }
}

impl std::fmt::Display for CimControlUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CimControlUnit")
    }
}

impl std::fmt::Debug for CimControlUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CimControlUnit")
            .field("running", &self.inner.base.running())
            .finish()
    }
}

impl fu::ExecuteUnit for CimControlUnit {
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
            Payload::CimControl(payload) => {
                resource_allocation(&self.config.cim, &self.address_space, descriptor, payload)
            }
            _ => ResourceAllocation::new(descriptor.id, descriptor.unit_type),
        }
    }
}

impl crate::engine::cycle::Component for CimControlUnit {
    fn cycle(&mut self, cycle: u64) {
        let Self {
            ref mut inner,
            ref config,
            ref address_space,
        } = *self;
        let cim = &config.cim;
        inner.cycle_with(
            cycle,
            |descriptor, payload| {
                let Payload::CimControl(payload) = payload else {
                    return None;
                };
                let latency = match payload.op {
                    CimControlOp::SetActivation => cim.set_activation_latency,
                    _ => cim.output_latency,
                };
                log::debug!(
                    "cim_control: {} {} (group={}, broadcast={})",
                    payload.op,
                    descriptor,
                    payload.group_id,
                    payload.group_broadcast
                );
                Some(Plan {
                    allocation: resource_allocation(cim, address_space, descriptor, &payload),
                    batches: Batch::split(*descriptor, 1, &[latency], |_| ()),
                    use_pipeline: false,
                })
            },
            |_| {},
        );
    }
}
