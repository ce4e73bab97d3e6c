//! Streaming LZ-variant compressor for the sample store.
//!
//! [`token`] defines the two-format token encoding written to the
//! compressed ring log; [`Encoder`] consumes the raw ring log one sample
//! per call, searching for matches across samples within a batch window
//! and carrying partial-match / partial-literal state between calls so
//! no sample is ever buffered twice.
//!
//! No decoder runs on the device; decompression happens server-side.

pub mod encoder;
pub mod token;

pub use encoder::{Continuation, Encoder, EncoderStats};
