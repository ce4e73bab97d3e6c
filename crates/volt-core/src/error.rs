//! Error types for the memory subsystem.

use thiserror_no_std::Error;

/// Errors surfaced by the store, ring logs and encoder.
///
/// Nothing here is fatal to the device: transient device errors are
/// retried with a small fixed bound at the call site, and everything else
/// is recovered by aborting the current operation back to the last
/// committed point. The device must keep sampling even while compression
/// or upload is failing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The storage device reported work-in-progress and cannot accept a
    /// new operation yet.
    #[error("storage device busy")]
    DeviceBusy,
    /// The storage device did not become ready within the bounded poll
    /// window.
    #[error("storage device timeout")]
    Timeout,
    /// A read or write failed at the device level. Propagates up and
    /// triggers `abort()` so no partial write is considered committed.
    #[error("storage fault")]
    StoreFault,
    /// An append would overwrite data that has not been confirmed
    /// consumed. The cursor is not advanced.
    #[error("ring log full")]
    RingFull,
    /// The compressed region has no room for this sample's tokens. The
    /// compression attempt is abandoned and retried on a later cycle;
    /// the raw data stays safely in the raw log meanwhile.
    #[error("compressed region full")]
    OutputFull,
}
