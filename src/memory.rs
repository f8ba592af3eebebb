use crate::address_space::{AddressSpace, Region};
use crate::sync::{Arc, Mutex};

pub const WORD_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    offset: i64,
    size: usize,
    /// Grown on demand, bytes past the end read as zero.
    bytes: Vec<u8>,
}

/// Byte storage backing a set of address space regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    name: String,
    segments: Vec<Segment>,
}

impl Memory {
    #[must_use]
    pub fn new<'a>(name: impl Into<String>, regions: impl IntoIterator<Item = &'a Region>) -> Self {
        let segments = regions
            .into_iter()
            .map(|region| Segment {
                offset: region.offset,
                size: usize::try_from(region.size).unwrap_or(0),
                bytes: Vec::new(),
            })
            .collect();
        Self {
            name: name.into(),
            segments,
        }
    }

    fn segment(&self, address: i64, len: usize) -> Option<(usize, usize)> {
        self.segments.iter().enumerate().find_map(|(idx, segment)| {
            let start = usize::try_from(address.checked_sub(segment.offset)?).ok()?;
            (start + len <= segment.size).then_some((idx, start))
        })
    }

    /// Reads `len` bytes, out of range reads yield zeros.
    #[must_use]
    pub fn read(&self, address: i64, len: usize) -> Vec<u8> {
        let mut data = vec![0; len];
        match self.segment(address, len) {
            Some((idx, start)) => {
                let bytes = &self.segments[idx].bytes;
                for (i, byte) in data.iter_mut().enumerate() {
                    if let Some(value) = bytes.get(start + i) {
                        *byte = *value;
                    }
                }
            }
            None => log::warn!(
                "{}: read of {len} bytes at {address} is out of range",
                self.name
            ),
        }
        data
    }

    pub fn write(&mut self, address: i64, data: &[u8]) {
        let Some((idx, start)) = self.segment(address, data.len()) else {
            log::warn!(
                "{}: write of {} bytes at {address} is out of range",
                self.name,
                data.len()
            );
            return;
        };
        let bytes = &mut self.segments[idx].bytes;
        let end = start + data.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
    }
}

/// Access to the local memory of a core and the shared global memory.
#[derive(Debug, Clone)]
pub struct MemoryPort {
    address_space: Arc<AddressSpace>,
    local: Arc<Mutex<Memory>>,
    global: Arc<Mutex<Memory>>,
}

impl MemoryPort {
    #[must_use]
    pub fn new(
        address_space: Arc<AddressSpace>,
        local: Arc<Mutex<Memory>>,
        global: Arc<Mutex<Memory>>,
    ) -> Self {
        Self {
            address_space,
            local,
            global,
        }
    }

    /// Creates a port with fresh local and global storage.
    #[must_use]
    pub fn standalone(address_space: Arc<AddressSpace>) -> Self {
        let local = Memory::new(
            "local",
            address_space.regions().filter(|region| !region.global),
        );
        let global = Memory::new(
            "global",
            address_space.regions().filter(|region| region.global),
        );
        Self::new(
            address_space,
            Arc::new(Mutex::new(local)),
            Arc::new(Mutex::new(global)),
        )
    }

    #[must_use]
    pub fn address_space(&self) -> &AddressSpace {
        &self.address_space
    }

    #[must_use]
    pub fn read(&self, address: i64, len: usize) -> Vec<u8> {
        if self.address_space.is_global(address) {
            self.global.lock().read(address, len)
        } else {
            self.local.lock().read(address, len)
        }
    }

    pub fn write(&self, address: i64, data: &[u8]) {
        if self.address_space.is_global(address) {
            self.global.lock().write(address, data);
        } else {
            self.local.lock().write(address, data);
        }
    }

    #[must_use]
    pub fn read_word(&self, address: i64) -> i32 {
        let mut word = [0; WORD_SIZE];
        word.copy_from_slice(&self.read(address, WORD_SIZE));
        i32::from_le_bytes(word)
    }

    pub fn write_word(&self, address: i64, value: i32) {
        self.write(address, &value.to_le_bytes());
    }
}
