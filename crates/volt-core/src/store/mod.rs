//! Non-volatile sample store.
//!
//! Three layers, leaves first:
//!
//! - [`ByteStore`]: raw byte I/O over a fixed-size non-volatile array
//!   (an SPI serial EEPROM on hardware, [`MemStore`] on the host).
//! - [`ring`]: the one place that performs modular address arithmetic.
//! - [`RingLog`]: append/read circular log with separate write, read and
//!   committed cursors, instantiated once per region (raw samples and
//!   compressed tokens).

pub mod byte_store;
pub mod ring;
pub mod ring_log;

pub use byte_store::{ByteStore, MemStore, SpiEeprom};
pub use ring::Region;
pub use ring_log::RingLog;
