use crate::allocation::MemoryId;
use crate::config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub offset: i64,
    pub size: i64,
    /// Local and global regions are numbered separately.
    pub memory_id: MemoryId,
    pub global: bool,
}

impl Region {
    #[must_use]
    pub fn end(&self) -> i64 {
        self.offset.saturating_add(self.size)
    }

    #[must_use]
    pub fn contains(&self, address: i64) -> bool {
        (self.offset..self.end()).contains(&address)
    }
}

/// Maps byte addresses to memory regions.
///
/// Regions are laid out back to back in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpace {
    regions: Vec<Region>,
    local_count: usize,
    global_count: usize,
}

impl AddressSpace {
    #[must_use]
    pub fn new(regions: &[config::Region]) -> Self {
        let mut offset = 0;
        let mut local_count = 0;
        let mut global_count = 0;
        let regions = regions
            .iter()
            .map(|region| {
                let counter = if region.global {
                    &mut global_count
                } else {
                    &mut local_count
                };
                // regions past the end of the i64 range are clamped to it
                let size = i64::try_from(region.size)
                    .unwrap_or(i64::MAX)
                    .min(i64::MAX - offset);
                let mapped = Region {
                    name: region.name.clone(),
                    offset,
                    size,
                    memory_id: *counter,
                    global: region.global,
                };
                *counter += 1;
                offset = offset.saturating_add(size);
                mapped
            })
            .collect();
        Self {
            regions,
            local_count,
            global_count,
        }
    }

    /// Finds the region containing `address`.
    #[must_use]
    pub fn region(&self, address: i64) -> Option<&Region> {
        // regions are sorted by offset, find the last one starting at or before address
        let idx = self
            .regions
            .partition_point(|region| region.offset <= address);
        let region = self.regions.get(idx.checked_sub(1)?)?;
        region.contains(address).then_some(region)
    }

    /// Memory id of the local region containing `address`.
    ///
    /// Logs and returns `None` for unmapped or global addresses.
    #[must_use]
    pub fn local_memory_id(&self, address: i64) -> Option<MemoryId> {
        match self.region(address) {
            Some(region) if !region.global => Some(region.memory_id),
            Some(region) => {
                log::warn!(
                    "address {address} lies in global region {:?}, not in local memory",
                    region.name
                );
                None
            }
            None => {
                log::warn!("address {address} does not match any memory");
                None
            }
        }
    }

    #[must_use]
    pub fn is_global(&self, address: i64) -> bool {
        self.region(address).is_some_and(|region| region.global)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.name == name)
    }

    #[must_use]
    pub fn memory_id(&self, name: &str) -> Option<MemoryId> {
        self.get(name).map(|region| region.memory_id)
    }

    #[must_use]
    pub fn offset(&self, name: &str) -> Option<i64> {
        self.get(name).map(|region| region.offset)
    }

    /// Pseudo memory id of the register file, following the last local memory.
    #[must_use]
    pub fn register_file_memory_id(&self) -> MemoryId {
        self.local_count
    }

    #[must_use]
    pub fn memory_count(&self, global: bool) -> usize {
        if global {
            self.global_count
        } else {
            self.local_count
        }
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter()
    }

    /// End of the address space.
    #[must_use]
    pub fn end(&self) -> i64 {
        self.regions.last().map_or(0, Region::end)
    }
}
