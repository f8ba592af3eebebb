use crate::address_space::AddressSpace;
use crate::allocation::ResourceAllocation;
use crate::config;
use crate::func_unit::{self as fu, Batch, Plan};
use crate::instruction::{InstructionDescriptor, Payload, TransferKind, TransferPayload, UnitType};
use crate::memory::MemoryPort;
use crate::sync::Arc;

/// Part of a copy moved by one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub src_address: i64,
    pub dst_address: i64,
    pub size: usize,
}

#[must_use]
pub fn resource_allocation(
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &TransferPayload,
) -> ResourceAllocation {
    let mut allocation = ResourceAllocation::new(descriptor.id, descriptor.unit_type);
    match payload.kind {
        TransferKind::Local => {
            allocation
                .add_read(address_space.local_memory_id(payload.src_address))
                .add_write(address_space.local_memory_id(payload.dst_address));
        }
        TransferKind::GlobalLoad => {
            allocation.add_write(address_space.local_memory_id(payload.dst_address));
        }
        TransferKind::GlobalStore => {
            allocation.add_read(address_space.local_memory_id(payload.src_address));
        }
    }
    allocation
}

fn plan(
    config: &config::TransferUnit,
    address_space: &AddressSpace,
    descriptor: &InstructionDescriptor,
    payload: &TransferPayload,
) -> Plan<Chunk> {
    let allocation = resource_allocation(address_space, descriptor, payload);
    let (chunk_size, latencies) = match payload.kind {
        TransferKind::Local => (config.data_width, [config.read_latency, config.write_latency]),
        TransferKind::GlobalLoad => (payload.size, [config.global_latency, config.write_latency]),
        TransferKind::GlobalStore => (payload.size, [config.read_latency, config.global_latency]),
    };
    let num_batches = utils::div_ceil(payload.size, chunk_size);
    let batches = Batch::split(*descriptor, num_batches, &latencies, |index| {
        let offset = index * chunk_size;
        let offset_address = i64::try_from(offset).unwrap_or(i64::MAX);
        Chunk {
            src_address: payload.src_address.saturating_add(offset_address),
            dst_address: payload.dst_address.saturating_add(offset_address),
            size: chunk_size.min(payload.size.saturating_sub(offset)),
        }
    });
    let use_pipeline = config.pipeline
        && payload.kind == TransferKind::Local
        && address_space.local_memory_id(payload.src_address)
            != address_space.local_memory_id(payload.dst_address);
    Plan {
        allocation,
        batches,
        use_pipeline,
    }
}

/// Moves data between local memories and to and from global memory.
pub struct TransferUnit {
    inner: fu::PipelinedUnit<Chunk>,
    config: Arc<config::Chip>,
    memory: MemoryPort,
}

impl TransferUnit {
    #[must_use]
    pub fn new(config: Arc<config::Chip>, memory: MemoryPort) -> Self {
        let base = fu::Base::new("transfer", UnitType::Transfer);
        Self {
            inner: fu::PipelinedUnit::new(base, &["read", "write"]),
            config,
            memory,
        }
    }
}

impl std::fmt::Display for TransferUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransferUnit")
    }
}

impl std::fmt::Debug for TransferUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferUnit")
            .field("data_width", &self.config.transfer.data_width)
            .field("running", &self.inner.base.running())
            .finish()
    }
}

impl fu::ExecuteUnit for TransferUnit {
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
            Payload::Transfer(payload) => {
                resource_allocation(self.memory.address_space(), descriptor, payload)
            }
            _ => ResourceAllocation::new(descriptor.id, descriptor.unit_type),
        }
    }
}

impl crate::engine::cycle::Component for TransferUnit {
    fn cycle(&mut self, cycle: u64) {
        let Self {
            ref mut inner,
            ref config,
            ref memory,
        } = *self;
        inner.cycle_with(
            cycle,
            |descriptor, payload| match payload {
                Payload::Transfer(payload) => Some(plan(
                    &config.transfer,
                    memory.address_space(),
                    descriptor,
                    &payload,
                )),
                _ => None,
            },
            |batch| {
                let Chunk {
                    src_address,
                    dst_address,
                    size,
                } = batch.info;
                log::trace!(
                    "transfer: {} copies {size} bytes from {src_address} to {dst_address}",
                    batch.descriptor
                );
                let data = memory.read(src_address, size);
                memory.write(dst_address, &data);
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::TransferUnit;
    use crate::address_space::AddressSpace;
    use crate::config;
    use crate::engine::cycle::Component;
    use crate::func_unit::ExecuteUnit;
    use crate::instruction::{
        Dispatch, InstructionDescriptor, Payload, TransferKind, TransferPayload, UnitType,
    };
    use crate::memory::MemoryPort;
    use crate::sync::Arc;

    const MEMORY_1: i64 = 64 * 1024;
    const GLOBAL: i64 = 3 * 64 * 1024;

    fn unit() -> (TransferUnit, MemoryPort) {
        let chip = config::Chip::default();
        let address_space = AddressSpace::new(&chip.address_space);
        let memory = MemoryPort::standalone(Arc::new(address_space));
        (TransferUnit::new(Arc::new(chip), memory.clone()), memory)
    }

    fn copy(id: i64, kind: TransferKind, src_address: i64, dst_address: i64, size: usize) -> Dispatch {
        Dispatch {
            descriptor: InstructionDescriptor {
                pc: id,
                id,
                unit_type: UnitType::Transfer,
            },
            payload: Some(Payload::Transfer(TransferPayload {
                kind,
                src_address,
                dst_address,
                size,
            })),
        }
    }

    fn run(unit: &mut TransferUnit) -> Option<u64> {
        (1..100).find(|&cycle| {
            unit.cycle(cycle);
            unit.base().running() == 0
        })
    }

    #[test]
    fn local_copy_moves_bytes_in_batches() {
        let (mut unit, memory) = unit();
        let data: Vec<u8> = (0..40).collect();
        memory.write(0, &data);

        unit.issue(copy(0, TransferKind::Local, 0, MEMORY_1, 40), true);
        // three pipelined batches through two single cycle stages
        assert_eq!(run(&mut unit), Some(5));
        assert_eq!(unit.stats().batches, 3);
        assert_eq!(memory.read(MEMORY_1, 40), data);

        let signals = unit.take_signals();
        let allocation = &signals.allocations[0];
        assert_eq!(allocation.read().iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(allocation.write().iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn copy_within_one_memory_is_not_pipelined() {
        let (mut unit, memory) = unit();
        memory.write(0, &[7; 32]);
        unit.issue(copy(0, TransferKind::Local, 0, 1024, 32), true);
        assert_eq!(run(&mut unit), Some(5));
        assert_eq!(memory.read(1024, 32), vec![7; 32]);
    }

    #[test]
    fn global_load_is_a_single_batch() {
        let (mut unit, memory) = unit();
        memory.write(GLOBAL, &[1, 2, 3, 4]);
        unit.issue(copy(0, TransferKind::GlobalLoad, GLOBAL, 16, 4), true);
        // global latency of 8 cycles followed by the write stage
        assert_eq!(run(&mut unit), Some(10));
        assert_eq!(unit.stats().batches, 1);
        assert_eq!(memory.read(16, 4), vec![1, 2, 3, 4]);

        let signals = unit.take_signals();
        assert!(signals.allocations[0].read().is_empty());
        assert_eq!(
            signals.allocations[0].write().iter().collect::<Vec<_>>(),
            vec![0]
        );
    }
}
