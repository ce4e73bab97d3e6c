//! Memory geometry.
//!
//! The 64 KiB device is split into two disjoint circular regions: the raw
//! sample log and the compressed token log. Geometry is fixed at compile
//! time; there is no runtime reconfiguration.

use crate::compress::encoder::MAX_SAMPLE_SIZE;
use crate::store::ring::Region;

/// Bytes in one sample record (see [`crate::sample`]).
pub const SAMPLE_SIZE: usize = 19;

/// Samples sharing one compression dictionary.
pub const BATCH_SIZE: u32 = 240;

/// Total size of the storage device.
pub const MEMORY_SIZE: u32 = 65536;

/// Capacity of the raw sample region.
pub const RAW_CAPACITY: u32 = 49152;

/// Capacity of the compressed token region.
pub const COMPRESSED_CAPACITY: u32 = 16384;

const _: () = assert!(RAW_CAPACITY + COMPRESSED_CAPACITY <= MEMORY_SIZE);
const _: () = assert!(SAMPLE_SIZE <= MAX_SAMPLE_SIZE);
// a full batch dictionary must stay well inside the retained raw window
const _: () = assert!(SAMPLE_SIZE as u32 * BATCH_SIZE * 2 <= RAW_CAPACITY);

/// The two regions of the storage device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    pub raw: Region,
    pub compressed: Region,
}

impl MemoryMap {
    /// Raw log at the bottom of the device, compressed log directly
    /// above it.
    pub const fn default_map() -> Self {
        Self {
            raw: Region::new(0, RAW_CAPACITY),
            compressed: Region::new(RAW_CAPACITY, COMPRESSED_CAPACITY),
        }
    }
}
