//! Streaming match-based encoder over the raw sample log.
//!
//! The encoder consumes exactly one sample per call and emits tokens
//! into the compressed ring log. Matches are searched across samples
//! within a *batch* window: a fixed count of consecutive samples sharing
//! one dictionary. A match source is never allowed to reach back before
//! the batch origin, so each batch decodes independently of its
//! predecessors.
//!
//! Because a match (or a literal run) may still be growing when the
//! current sample's bytes run out, the encoder carries explicit
//! [`Continuation`] state between calls instead of buffering input: a
//! suspended match is resumed against the next sample's bytes, a pending
//! literal run keeps collecting until a match interrupts it or it fills.
//!
//! Output is staged in RAM and appended to the compressed log as one
//! write after a free-space check, so a failed attempt (`OutputFull`,
//! device fault) never leaves a torn token behind: the encoder state and
//! the raw read cursor are rolled back and the same sample is retried on
//! a later cycle.

use log::{debug, warn};

use crate::compress::token::{self, MAX_LITERAL_RUN, MAX_MATCH, MAX_OFFSET, MIN_MATCH, Stage};
use crate::error::MemoryError;
use crate::store::byte_store::ByteStore;
use crate::store::ring_log::RingLog;

/// Largest supported sample record; bounds the per-call staging buffer.
pub const MAX_SAMPLE_SIZE: usize = 64;

/// Bytes of a pending literal run, carried across calls so the
/// compressed log only ever receives complete tokens.
pub type LiteralRun = heapless::Vec<u8, MAX_LITERAL_RUN>;

/// Encoder state carried between per-sample invocations.
///
/// Exactly one variant holds at any boundary; a pending match and a
/// pending literal run never coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Clean boundary: the previous sample ended on a finalized token.
    Clean,
    /// A literal run (1..=31 bytes) still open at the sample boundary.
    PendingLiteral(LiteralRun),
    /// A match still extending when input ran out: resumed against the
    /// next sample's bytes.
    PendingMatch { offset: u16, len: u16 },
}

/// Running totals, for reporting and debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    pub raw_in: u64,
    pub compressed_out: u64,
}

pub struct Encoder {
    sample_size: usize,
    batch_size: u32,
    /// Samples compressed in the current batch; 0 means the next sample
    /// starts a new batch.
    batch_index: u32,
    /// Logical raw position of the current batch's first byte. Match
    /// sources never precede this.
    batch_origin: u64,
    continuation: Continuation,
    stats: EncoderStats,
}

impl Encoder {
    pub fn new(sample_size: usize, batch_size: u32) -> Self {
        debug_assert!((MIN_MATCH..=MAX_SAMPLE_SIZE).contains(&sample_size));
        debug_assert!(batch_size >= 1);
        Self {
            sample_size,
            batch_size,
            batch_index: 0,
            batch_origin: 0,
            continuation: Continuation::Clean,
            stats: EncoderStats::default(),
        }
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    pub fn continuation(&self) -> &Continuation {
        &self.continuation
    }

    /// Compress the next sample from `raw` into `out`.
    ///
    /// Returns `Ok(true)` when a sample was consumed, `Ok(false)` when
    /// fewer than `sample_size` bytes are available. On any error the
    /// raw read cursor and the encoder's continuation and batch state
    /// are restored, so the same sample can be retried later; committed
    /// output is never touched.
    pub fn compress_sample<B: ByteStore>(
        &mut self,
        store: &mut B,
        raw: &mut RingLog,
        out: &mut RingLog,
    ) -> Result<bool, MemoryError> {
        if (raw.available() as usize) < self.sample_size {
            return Ok(false);
        }

        let saved_continuation = self.continuation.clone();
        let saved_index = self.batch_index;
        let saved_origin = self.batch_origin;

        match self.compress_inner(store, raw, out) {
            Ok(()) => {
                raw.commit();
                Ok(true)
            }
            Err(e) => {
                self.continuation = saved_continuation;
                self.batch_index = saved_index;
                self.batch_origin = saved_origin;
                raw.abort();
                Err(e)
            }
        }
    }

    fn compress_inner<B: ByteStore>(
        &mut self,
        store: &mut B,
        raw: &mut RingLog,
        out: &mut RingLog,
    ) -> Result<(), MemoryError> {
        let start = raw.read_pos();
        let window_end = start + self.sample_size as u64;
        raw.consume(self.sample_size as u32);

        let mut stage = Stage::new();

        // The producer is never blocked on compression, so while the
        // encoder is stalled appends may lap the batch dictionary. Once
        // the origin falls out of the retained window the batch cannot
        // continue: close it with whatever token is pending (both pending
        // forms are complete tokens on their own) and reseed from the
        // current sample.
        if self.batch_index != 0 && self.batch_origin < raw.oldest_pos() {
            warn!(
                "batch dictionary at {} overwritten, restarting batch",
                self.batch_origin
            );
            self.flush_continuation(&mut stage)?;
            self.batch_index = 0;
        }

        if self.batch_index == 0 {
            debug_assert_eq!(self.continuation, Continuation::Clean);
            self.batch_origin = start;
        }
        self.batch_index += 1;
        let last_of_batch = self.batch_index >= self.batch_size;

        if self.batch_index == 1 {
            copy_verbatim(store, raw, &mut stage, start, window_end)?;
        } else {
            self.scan_sample(store, raw, &mut stage, start, window_end, last_of_batch)?;
        }

        if stage.len() as u32 > out.free() {
            return Err(MemoryError::OutputFull);
        }
        out.append(store, &stage)?;

        self.stats.raw_in += self.sample_size as u64;
        self.stats.compressed_out += stage.len() as u64;

        if last_of_batch {
            debug_assert_eq!(self.continuation, Continuation::Clean);
            debug!(
                "batch of {} samples closed, totals {} -> {} bytes",
                self.batch_index, self.stats.raw_in, self.stats.compressed_out
            );
            self.batch_index = 0;
        }
        Ok(())
    }

    /// Emit any carried continuation state as a finalized token.
    fn flush_continuation(&mut self, stage: &mut Stage) -> Result<(), MemoryError> {
        match core::mem::replace(&mut self.continuation, Continuation::Clean) {
            Continuation::Clean => Ok(()),
            Continuation::PendingLiteral(run) => token::push_literal(stage, &run),
            Continuation::PendingMatch { offset, len } => {
                token::push_match(stage, offset, len as usize)
            }
        }
    }

    /// Interior/last-sample scan: resume continuation state, then walk
    /// the sample one byte at a time, preferring the nearest 3-byte
    /// dictionary match over extending the literal run.
    fn scan_sample<B: ByteStore>(
        &mut self,
        store: &mut B,
        raw: &RingLog,
        stage: &mut Stage,
        start: u64,
        window_end: u64,
        last_of_batch: bool,
    ) -> Result<(), MemoryError> {
        // On the last sample of a batch, matches stop short of the tail
        // so the batch always terminates in a finalized literal run.
        let tail = if last_of_batch { MIN_MATCH as u64 } else { 0 };
        let limit = window_end - tail;

        let mut pos = start;
        let mut run = LiteralRun::new();

        match core::mem::replace(&mut self.continuation, Continuation::Clean) {
            Continuation::Clean => {}
            Continuation::PendingLiteral(pending) => run = pending,
            Continuation::PendingMatch { offset, len } => {
                let (len, suspended) =
                    extend_match(store, raw, &mut pos, limit, offset, len as usize, last_of_batch)?;
                if suspended {
                    self.continuation = Continuation::PendingMatch {
                        offset,
                        len: len as u16,
                    };
                } else {
                    token::push_match(stage, offset, len)?;
                }
            }
        }

        while pos != window_end {
            let rem = (window_end - pos) as usize;
            // A probe needs three bytes of lookahead, and on the last
            // sample the match must also fit below the reserved tail.
            if rem >= MIN_MATCH + tail as usize {
                if let Some(offset) = self.find_match(store, raw, pos)? {
                    if !run.is_empty() {
                        token::push_literal(stage, &run)?;
                        run.clear();
                    }
                    let mut next = pos + MIN_MATCH as u64;
                    let (len, suspended) = extend_match(
                        store,
                        raw,
                        &mut next,
                        limit,
                        offset,
                        MIN_MATCH,
                        last_of_batch,
                    )?;
                    if suspended {
                        self.continuation = Continuation::PendingMatch {
                            offset,
                            len: len as u16,
                        };
                    } else {
                        token::push_match(stage, offset, len)?;
                    }
                    pos = next;
                    continue;
                }
            }

            let byte = byte_at(store, raw, pos)?;
            run.push(byte).map_err(|_| MemoryError::OutputFull)?;
            pos += 1;
            if run.len() == MAX_LITERAL_RUN {
                token::push_literal(stage, &run)?;
                run.clear();
            }
        }

        if last_of_batch {
            // No continuation may survive the batch: force the trailing
            // bytes out as a final literal run.
            if !run.is_empty() {
                token::push_literal(stage, &run)?;
            }
        } else if !run.is_empty() {
            self.continuation = Continuation::PendingLiteral(run);
        }
        Ok(())
    }

    /// Backward dictionary search: the nearest position in
    /// `[batch_origin, pos)` whose next three bytes equal the next three
    /// bytes at `pos`, within the encodable offset range.
    fn find_match<B: ByteStore>(
        &self,
        store: &mut B,
        raw: &RingLog,
        pos: u64,
    ) -> Result<Option<u16>, MemoryError> {
        let mut target = [0u8; MIN_MATCH];
        raw.read_at(store, pos, &mut target)?;

        let mut candidate = pos;
        while candidate > self.batch_origin {
            candidate -= 1;
            let offset = pos - candidate;
            if offset > MAX_OFFSET {
                break;
            }
            let mut probe = [0u8; MIN_MATCH];
            raw.read_at(store, candidate, &mut probe)?;
            if probe == target {
                return Ok(Some(offset as u16));
            }
        }
        Ok(None)
    }
}

/// Copy the first sample of a batch verbatim as finalized literal runs;
/// no dictionary exists yet.
fn copy_verbatim<B: ByteStore>(
    store: &mut B,
    raw: &RingLog,
    stage: &mut Stage,
    start: u64,
    window_end: u64,
) -> Result<(), MemoryError> {
    let mut pos = start;
    while pos != window_end {
        let n = MAX_LITERAL_RUN.min((window_end - pos) as usize);
        let mut buf = [0u8; MAX_LITERAL_RUN];
        raw.read_at(store, pos, &mut buf[..n])?;
        token::push_literal(stage, &buf[..n])?;
        pos += n as u64;
    }
    Ok(())
}

/// Extend a match whose next input byte is `*pos`, comparing against the
/// byte `offset` positions back. Returns the final length and whether
/// the match was suspended: still matching when the input ran out at
/// `limit`, with room left to grow.
fn extend_match<B: ByteStore>(
    store: &mut B,
    raw: &RingLog,
    pos: &mut u64,
    limit: u64,
    offset: u16,
    mut len: usize,
    last_of_batch: bool,
) -> Result<(usize, bool), MemoryError> {
    while *pos < limit && len < MAX_MATCH {
        if byte_at(store, raw, *pos)? != byte_at(store, raw, *pos - offset as u64)? {
            return Ok((len, false));
        }
        len += 1;
        *pos += 1;
    }
    let suspended = !last_of_batch && *pos == limit && len < MAX_MATCH;
    Ok((len, suspended))
}

fn byte_at<B: ByteStore>(store: &mut B, raw: &RingLog, pos: u64) -> Result<u8, MemoryError> {
    let mut byte = [0u8; 1];
    raw.read_at(store, pos, &mut byte)?;
    Ok(byte[0])
}
