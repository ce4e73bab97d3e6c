//! Circular append/read log with commit/rollback semantics.
//!
//! One `RingLog` instance manages one circular region: the raw sample
//! log and the compressed token log are two instances over disjoint
//! regions of the same [`ByteStore`].
//!
//! Three cursors, all monotonic logical positions (see [`ring`] for the
//! mapping to physical offsets):
//!
//! - `write`: next free byte, advanced only by the producer;
//! - `read`: next unread byte, advanced by the consumer;
//! - `committed`: last position confirmed consumed.
//!
//! `commit()` advances `committed` to `read`; `abort()` rewinds `read`
//! back to `committed`, so a failed upload can retry by re-reading the
//! same bytes later. Free space for appends is measured against the
//! committed cursor: bytes that were read but not yet confirmed must
//! stay replayable and are never overwritten.

use log::warn;

use crate::error::MemoryError;
use crate::store::byte_store::ByteStore;
use crate::store::ring::{self, Region};

pub struct RingLog {
    region: Region,
    write: u64,
    read: u64,
    committed: u64,
}

impl RingLog {
    pub const fn new(region: Region) -> Self {
        Self {
            region,
            write: 0,
            read: 0,
            committed: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.region.capacity
    }

    /// Unread bytes: `write - read`. Never exceeds the capacity.
    pub fn available(&self) -> u32 {
        (self.write - self.read) as u32
    }

    /// Bytes that can be appended without overwriting unconfirmed data.
    pub fn free(&self) -> u32 {
        self.region.capacity - (self.write - self.committed) as u32
    }

    /// Logical position of the next unread byte.
    pub fn read_pos(&self) -> u64 {
        self.read
    }

    /// Logical position of the next free byte.
    pub fn write_pos(&self) -> u64 {
        self.write
    }

    /// Oldest logical position still physically present. Positions below
    /// this have been overwritten by later appends.
    pub fn oldest_pos(&self) -> u64 {
        self.write.saturating_sub(self.region.capacity as u64)
    }

    /// Append `data` at the write cursor, splitting the device write in
    /// two pieces when it straddles the capacity boundary.
    ///
    /// Fails with [`MemoryError::RingFull`] if the append would overrun
    /// data that has not been confirmed consumed, and propagates device
    /// faults; the cursor is not advanced on any failure.
    pub fn append<B: ByteStore>(&mut self, store: &mut B, data: &[u8]) -> Result<(), MemoryError> {
        let len = data.len() as u32;
        if len > self.free() {
            warn!(
                "ring append of {} bytes rejected, {} free",
                len,
                self.free()
            );
            return Err(MemoryError::RingFull);
        }

        let cap = self.region.capacity;
        let ((a0, l0), rest) = ring::segments(ring::phys(self.write, cap), len, cap);
        store.write(self.region.base + a0, &data[..l0 as usize])?;
        if let Some((a1, l1)) = rest {
            store.write(self.region.base + a1, &data[l0 as usize..(l0 + l1) as usize])?;
        }
        self.write += len as u64;
        Ok(())
    }

    /// Read up to `buf.len()` bytes from the read cursor.
    ///
    /// Returns the number of bytes read, which is smaller than requested
    /// only when fewer bytes are available; never blocks. Advances the
    /// read cursor; on a device fault the cursor is not advanced.
    pub fn read_into<B: ByteStore>(
        &mut self,
        store: &mut B,
        buf: &mut [u8],
    ) -> Result<usize, MemoryError> {
        let len = (self.available() as usize).min(buf.len());
        self.read_at(store, self.read, &mut buf[..len])?;
        self.read += len as u64;
        Ok(len)
    }

    /// Advance the read cursor by up to `len` bytes without reading.
    ///
    /// Returns the number of bytes actually skipped.
    pub fn consume(&mut self, len: u32) -> u32 {
        let n = self.available().min(len);
        self.read += n as u64;
        n
    }

    /// Read bytes at an absolute logical position without touching the
    /// cursors. Used by the encoder for dictionary access into data that
    /// has already been consumed but is still physically present.
    ///
    /// The span must lie within the retained window
    /// `[write - capacity, write]`.
    pub fn read_at<B: ByteStore>(
        &self,
        store: &mut B,
        pos: u64,
        buf: &mut [u8],
    ) -> Result<(), MemoryError> {
        let len = buf.len() as u32;
        if pos < self.oldest_pos() || pos + len as u64 > self.write {
            return Err(MemoryError::StoreFault);
        }

        let cap = self.region.capacity;
        let ((a0, l0), rest) = ring::segments(ring::phys(pos, cap), len, cap);
        store.read(self.region.base + a0, &mut buf[..l0 as usize])?;
        if let Some((a1, l1)) = rest {
            store.read(self.region.base + a1, &mut buf[l0 as usize..(l0 + l1) as usize])?;
        }
        Ok(())
    }

    /// Confirm everything read so far as delivered. Bytes before the
    /// committed cursor may be overwritten by future appends.
    pub fn commit(&mut self) {
        self.committed = self.read;
    }

    /// Discard any reads since the last commit.
    pub fn abort(&mut self) {
        self.read = self.committed;
    }
}
