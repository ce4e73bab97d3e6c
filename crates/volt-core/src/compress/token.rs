//! Token encoding for the compressed stream.
//!
//! Two variable-width formats:
//!
//! - *Literal run*: one header byte holding `run_len - 1` (0..=31),
//!   followed by the raw bytes.
//! - *Match*: a backward `offset` (1..=8191, 13 bits) and a length code
//!   `actual_len - 2`. Length codes below 7 pack into two bytes
//!   (`(offset >> 8) | (code << 5)`, `offset & 0xFF`); longer matches
//!   take three bytes with the middle byte holding `code - 7`.
//!
//! The header byte's top three bits disambiguate: zero means literal
//! run, 1..=6 a short match, 7 a long match.

use crate::error::MemoryError;

/// Minimum raw length of an encodable match. Shorter repeats are always
/// emitted as literals; a two-byte match token would not beat them.
pub const MIN_MATCH: usize = 3;

/// Maximum raw length of a single match token.
pub const MAX_MATCH: usize = 263;

/// Maximum backward distance of a match source.
pub const MAX_OFFSET: u64 = 8191;

/// Maximum bytes in one literal run.
pub const MAX_LITERAL_RUN: usize = 32;

/// Staging capacity for one compress-one-sample call: a pending literal
/// run, a full sample of literals, their headers, and a match token.
pub const STAGE_CAPACITY: usize = 128;

pub type Stage = heapless::Vec<u8, STAGE_CAPACITY>;

/// Append a literal-run token for `bytes` (1..=32 of them).
pub fn push_literal(stage: &mut Stage, bytes: &[u8]) -> Result<(), MemoryError> {
    debug_assert!(!bytes.is_empty() && bytes.len() <= MAX_LITERAL_RUN);
    stage
        .push((bytes.len() - 1) as u8)
        .map_err(|_| MemoryError::OutputFull)?;
    stage
        .extend_from_slice(bytes)
        .map_err(|_| MemoryError::OutputFull)
}

/// Append a match token for `len` raw bytes at backward distance
/// `offset`.
pub fn push_match(stage: &mut Stage, offset: u16, len: usize) -> Result<(), MemoryError> {
    debug_assert!((1..=MAX_OFFSET as u16).contains(&offset));
    debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len));
    let code = len - 2;
    let hi = (offset >> 8) as u8;
    let lo = offset as u8;
    let mut token = [0u8; 3];
    let token = if code < 7 {
        token[0] = hi | ((code as u8) << 5);
        token[1] = lo;
        &token[..2]
    } else {
        token[0] = hi | (7 << 5);
        token[1] = (code - 7) as u8;
        token[2] = lo;
        &token[..3]
    };
    stage
        .extend_from_slice(token)
        .map_err(|_| MemoryError::OutputFull)
}
