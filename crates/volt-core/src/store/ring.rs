//! Ring address arithmetic.
//!
//! All modular address math for the circular regions lives here; the
//! other store components only ever call these helpers and never compute
//! `%`/`+`/`-` on physical addresses themselves. The capacities involved
//! are not powers of two, so wraparound must be exact: no byte skipped
//! and none double-counted at the boundary.
//!
//! Cursors elsewhere in the store are *logical* monotonic `u64` positions
//! and are mapped to physical ring offsets only through [`phys`].

/// A contiguous circular region of the non-volatile address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First physical byte address of the region.
    pub base: u32,
    /// Region size in bytes; all ring offsets are modulo this value.
    pub capacity: u32,
}

impl Region {
    /// Create a region covering `[base, base + capacity)`.
    pub const fn new(base: u32, capacity: u32) -> Self {
        Self { base, capacity }
    }
}

/// Map a monotonic logical position to a physical ring offset.
pub fn phys(pos: u64, capacity: u32) -> u32 {
    debug_assert!(capacity > 0);
    (pos % capacity as u64) as u32
}

/// Advance a physical ring offset by `n`, wrapping at `capacity`.
pub fn advance(addr: u32, n: u32, capacity: u32) -> u32 {
    debug_assert!(addr < capacity);
    ((addr as u64 + n as u64) % capacity as u64) as u32
}

/// Forward circular distance from `from` to `to`.
pub fn distance(from: u32, to: u32, capacity: u32) -> u32 {
    debug_assert!(from < capacity && to < capacity);
    if to >= from {
        to - from
    } else {
        capacity - from + to
    }
}

/// Split a span of `len` bytes starting at ring offset `addr` into the
/// physically contiguous chunks it occupies.
///
/// Returns the first `(offset, len)` chunk and, when the span straddles
/// the wrap boundary, the second chunk starting at offset 0. `len` must
/// not exceed `capacity`.
pub fn segments(addr: u32, len: u32, capacity: u32) -> ((u32, u32), Option<(u32, u32)>) {
    debug_assert!(addr < capacity);
    debug_assert!(len <= capacity);
    let first = len.min(capacity - addr);
    if first == len {
        ((addr, len), None)
    } else {
        ((addr, first), Some((0, len - first)))
    }
}
