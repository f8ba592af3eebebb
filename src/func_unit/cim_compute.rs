use crate::address_space::AddressSpace;
use crate::allocation::ResourceAllocation;
use crate::config;
use crate::func_unit::{self as fu, Batch, Plan};
use crate::instruction::{CimComputePayload, InstructionDescriptor, Payload, UnitType};
use crate::sync::Arc;

#[must_use]
pub fn resource_allocation(
    config: &config::CimUnit,
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &CimComputePayload,
) -> ResourceAllocation {
    let mut allocation = ResourceAllocation::new(descriptor.id, descriptor.unit_type);
    allocation
        .add_read(address_space.local_memory_id(payload.input_address))
        .add_read(address_space.memory_id(&config.memory));
    if config.value_sparse && payload.value_sparse {
        allocation.add_read(address_space.local_memory_id(payload.value_sparse_mask_address));
    }
    if config.bit_sparse && payload.bit_sparse {
        allocation.add_read(address_space.local_memory_id(payload.bit_sparse_meta_address));
    }
    allocation
}

/// Latency of one sub-instruction in the compute stage.
///
/// Macro groups beyond the number that can be active at once do not add latency.
#[must_use]
pub fn compute_latency(config: &config::CimUnit, payload: &CimComputePayload) -> u64 {
    let groups = payload
        .activation_group_num
        .min(config.macro_groups)
        .max(1);
    config
        .compute_latency
        .saturating_mul(u64::try_from(groups).unwrap_or(u64::MAX))
}

fn plan(
    config: &config::CimUnit,
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &CimComputePayload,
) -> Plan<()> {
    let allocation = resource_allocation(config, address_space, descriptor, payload);
    let batches = Batch::split(
        *descriptor,
        utils::div_ceil(payload.input_len, config.compartments),
        &[config.read_latency, compute_latency(config, payload)],
        |_| (),
    );
    // sub-instructions share the macro arrays and never overlap
    Plan {
        allocation,
        batches,
        use_pipeline: false,
    }
}

/// Matrix vector multiplication on the compute-in-memory macros.
pub struct CimComputeUnit {
    inner: fu::PipelinedUnit<()>,
    config: Arc<config::Chip>,
    address_space: Arc<AddressSpace>,
}

impl CimComputeUnit {
    #[must_use]
    pub fn new(config: Arc<config::Chip>, address_space: Arc<AddressSpace>) -> Self {
        let base = fu::Base::new("cim_compute", UnitType::CimCompute);
        Self {
            inner: fu::PipelinedUnit::new(base, &["read", "compute"]),
            config,
            address_space,
        }
    }
}

impl std::fmt::Display for CimComputeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CimComputeUnit")
    }
}

impl std::fmt::Debug for CimComputeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CimComputeUnit")
            .field("macro_groups", &self.config.cim.macro_groups)
            .field("running", &self.inner.base.running())
            .finish()
    }
}

impl fu::ExecuteUnit for CimComputeUnit {
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
            Payload::CimCompute(payload) => {
                resource_allocation(&self.config.cim, &self.address_space, descriptor, payload)
            }
            _ => ResourceAllocation::new(descriptor.id, descriptor.unit_type),
        }
    }
}

impl crate::engine::cycle::Component for CimComputeUnit {
    fn cycle(&mut self, cycle: u64) {
        let Self {
            ref mut inner,
            ref config,
            ref address_space,
        } = *self;
        inner.cycle_with(
            cycle,
            |descriptor, payload| match payload {
                Payload::CimCompute(payload) => {
                    Some(plan(&config.cim, address_space, descriptor, &payload))
                }
                _ => None,
            },
            |_| {},
        );
    }
}
