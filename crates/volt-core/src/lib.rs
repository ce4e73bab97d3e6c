//! Hardware-independent core library for volt-rs
//!
//! This crate contains all platform-agnostic logic for the volt battery
//! telemetry logger: the circular non-volatile sample store, the streaming
//! LZ-variant compressor, the cooperative tick scheduler, and the sample
//! record layout.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests). All
//! storage access goes through the [`store::ByteStore`] trait; the SPI
//! EEPROM binding is generic over `embedded-hal` traits and carries no
//! target-specific code.

#![no_std]

extern crate alloc;

pub mod compress;
pub mod config;
pub mod error;
pub mod sample;
pub mod sched;
pub mod store;

pub use error::MemoryError;
