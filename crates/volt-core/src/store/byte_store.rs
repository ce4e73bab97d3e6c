//! Raw byte access to the non-volatile storage device.
//!
//! [`ByteStore`] is the seam between the ring logs and the hardware:
//! plain byte I/O plus a busy/ready wait, no semantics beyond that.
//! [`SpiEeprom`] binds it to an SPI-attached serial EEPROM through
//! `embedded-hal` traits; [`MemStore`] backs it with RAM for the
//! simulator and tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

use crate::error::MemoryError;

/// Byte-level access to a fixed-size non-volatile array.
///
/// Addresses are absolute device addresses in `0..capacity()`. Callers
/// are expected to retry transient failures (`DeviceBusy`/`Timeout`) a
/// small fixed number of times before treating the store as failed.
pub trait ByteStore {
    /// Bring the device to a ready state.
    fn start(&mut self) -> Result<(), MemoryError>;

    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Write `data` starting at `addr`.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError>;

    /// Erase the entire device.
    fn erase_all(&mut self) -> Result<(), MemoryError>;

    /// Total device size in bytes.
    fn capacity(&self) -> u32;
}

// ---------------------------------------------------------------------------
// SPI serial EEPROM
// ---------------------------------------------------------------------------

// EEPROM opcodes
const WREN: u8 = 0x06;
const RDSR: u8 = 0x05;
const READ: u8 = 0x03;
const WRIT: u8 = 0x02;
const CE: u8 = 0xC7;

/// Work-in-progress bit of the status register.
const WIP_MASK: u8 = 0x01;

/// Writes must not cross a device page.
const PAGE_SIZE: u32 = 128;

/// Poll window before a busy device is declared timed out, in 1 ms steps.
const READY_TIMEOUT_MS: u32 = 1000;

/// SPI serial EEPROM with 16-bit addressing (up to 64 KiB).
///
/// Page overflow on writes is handled here: a write spanning a page
/// boundary is issued as multiple page programs, each preceded by a
/// write-enable and followed by a bounded work-in-progress poll.
pub struct SpiEeprom<S, D> {
    spi: S,
    delay: D,
    capacity: u32,
}

impl<S, D> SpiEeprom<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    pub fn new(spi: S, delay: D, capacity: u32) -> Self {
        debug_assert!(capacity <= 1 << 16);
        Self {
            spi,
            delay,
            capacity,
        }
    }

    fn is_busy(&mut self) -> Result<bool, MemoryError> {
        let mut status = [0u8; 1];
        self.spi
            .transaction(&mut [Operation::Write(&[RDSR]), Operation::Read(&mut status)])
            .map_err(|_| MemoryError::StoreFault)?;
        Ok(status[0] & WIP_MASK != 0)
    }

    fn wait_ready(&mut self) -> Result<(), MemoryError> {
        for _ in 0..READY_TIMEOUT_MS {
            if !self.is_busy()? {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        Err(MemoryError::Timeout)
    }

    fn write_enable(&mut self) -> Result<(), MemoryError> {
        self.spi
            .transaction(&mut [Operation::Write(&[WREN])])
            .map_err(|_| MemoryError::StoreFault)?;
        self.wait_ready()
    }

    /// Program one span that fits within a single device page.
    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        debug_assert!(addr % PAGE_SIZE + data.len() as u32 <= PAGE_SIZE);
        self.write_enable()?;
        self.spi
            .transaction(&mut [
                Operation::Write(&[WRIT, (addr >> 8) as u8, addr as u8]),
                Operation::Write(data),
            ])
            .map_err(|_| MemoryError::StoreFault)?;
        self.wait_ready()
    }
}

impl<S, D> ByteStore for SpiEeprom<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    fn start(&mut self) -> Result<(), MemoryError> {
        self.wait_ready()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        debug_assert!(addr as u64 + buf.len() as u64 <= self.capacity as u64);
        // a read issued during an internal write cycle returns garbage;
        // report busy and let the caller retry on a later cycle
        if self.is_busy()? {
            return Err(MemoryError::DeviceBusy);
        }
        self.spi
            .transaction(&mut [
                Operation::Write(&[READ, (addr >> 8) as u8, addr as u8]),
                Operation::Read(buf),
            ])
            .map_err(|_| MemoryError::StoreFault)
    }

    fn write(&mut self, mut addr: u32, mut data: &[u8]) -> Result<(), MemoryError> {
        debug_assert!(addr as u64 + data.len() as u64 <= self.capacity as u64);
        while !data.is_empty() {
            let room = (PAGE_SIZE - addr % PAGE_SIZE) as usize;
            let part = room.min(data.len());
            self.write_page(addr, &data[..part])?;
            addr += part as u32;
            data = &data[part..];
        }
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), MemoryError> {
        self.write_enable()?;
        self.spi
            .transaction(&mut [Operation::Write(&[CE])])
            .map_err(|_| MemoryError::StoreFault)?;
        self.wait_ready()
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// RAM-backed store
// ---------------------------------------------------------------------------

/// RAM-backed [`ByteStore`] for the simulator and tests.
pub struct MemStore {
    data: alloc::vec::Vec<u8>,
}

impl MemStore {
    /// Create a store of `capacity` bytes, filled with the erased value.
    pub fn new(capacity: u32) -> Self {
        Self {
            data: alloc::vec![0xFF; capacity as usize],
        }
    }
}

impl ByteStore for MemStore {
    fn start(&mut self) -> Result<(), MemoryError> {
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let addr = addr as usize;
        let end = addr.checked_add(buf.len()).ok_or(MemoryError::StoreFault)?;
        let src = self.data.get(addr..end).ok_or(MemoryError::StoreFault)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let addr = addr as usize;
        let end = addr.checked_add(data.len()).ok_or(MemoryError::StoreFault)?;
        let dst = self
            .data
            .get_mut(addr..end)
            .ok_or(MemoryError::StoreFault)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), MemoryError> {
        self.data.fill(0xFF);
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.data.len() as u32
    }
}
