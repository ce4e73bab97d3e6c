//! End-to-end compression coverage: every byte appended to the raw log
//! must come back out of a reference decoder applied to the compressed
//! stream, across sample boundaries, batch boundaries and physical
//! wraparound, with uplink failures replaying instead of losing data.
//!
//! The decoder exists only here; the device never decompresses.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use volt_core::MemoryError;
use volt_core::compress::Encoder;
use volt_core::sample::BatterySample;
use volt_core::store::{ByteStore, MemStore, Region, RingLog};

const MAX_LITERAL_RUN: usize = 32;
const MAX_MATCH: usize = 263;
const MAX_OFFSET: usize = 8191;

/// Decode a token stream, checking every token invariant on the way:
/// literal runs 1..=32 bytes, match lengths 3..=263, offsets 1..=8191,
/// and no match source reaching back before the start of its batch.
fn decode(stream: &[u8], batch_bytes: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < stream.len() {
        let header = stream[i];
        let kind = header >> 5;
        if kind == 0 {
            let n = (header & 0x1F) as usize + 1;
            assert!(n <= MAX_LITERAL_RUN);
            assert!(i + 1 + n <= stream.len(), "truncated literal run");
            out.extend_from_slice(&stream[i + 1..i + 1 + n]);
            i += 1 + n;
        } else {
            let (code, offset, token_len) = if kind == 7 {
                assert!(i + 3 <= stream.len(), "truncated long match");
                (
                    7 + stream[i + 1] as usize,
                    (((header & 0x1F) as usize) << 8) | stream[i + 2] as usize,
                    3,
                )
            } else {
                assert!(i + 2 <= stream.len(), "truncated short match");
                (
                    kind as usize,
                    (((header & 0x1F) as usize) << 8) | stream[i + 1] as usize,
                    2,
                )
            };
            let len = code + 2;
            assert!((3..=MAX_MATCH).contains(&len));
            assert!((1..=MAX_OFFSET).contains(&offset));
            assert!(offset <= out.len(), "offset before start of stream");
            let batch_start = out.len() / batch_bytes * batch_bytes;
            assert!(
                out.len() - offset >= batch_start,
                "match source before batch origin"
            );
            for _ in 0..len {
                let byte = out[out.len() - offset];
                out.push(byte);
            }
            i += token_len;
        }
    }
    out
}

fn drain_all(store: &mut MemStore, log: &mut RingLog, sink: &mut Vec<u8>) {
    let mut buf = [0u8; 64];
    loop {
        let n = log.read_into(store, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        sink.extend_from_slice(&buf[..n]);
    }
    log.commit();
}

struct Bench {
    store: MemStore,
    raw: RingLog,
    out: RingLog,
    enc: Encoder,
    sample_size: usize,
    batch_size: u32,
    appended: Vec<u8>,
    compressed: Vec<u8>,
}

impl Bench {
    fn new(raw_cap: u32, out_cap: u32, sample_size: usize, batch_size: u32) -> Self {
        let mut store = MemStore::new(raw_cap + out_cap);
        store.start().unwrap();
        Self {
            store,
            raw: RingLog::new(Region::new(0, raw_cap)),
            out: RingLog::new(Region::new(raw_cap, out_cap)),
            enc: Encoder::new(sample_size, batch_size),
            sample_size,
            batch_size,
            appended: Vec::new(),
            compressed: Vec::new(),
        }
    }

    /// Append one sample, compress it, drain the compressed log.
    fn push(&mut self, record: &[u8]) {
        assert_eq!(record.len(), self.sample_size);
        self.raw.append(&mut self.store, record).unwrap();
        self.appended.extend_from_slice(record);
        assert!(
            self.enc
                .compress_sample(&mut self.store, &mut self.raw, &mut self.out)
                .unwrap()
        );
        drain_all(&mut self.store, &mut self.out, &mut self.compressed);
    }

    fn check_round_trip(&self) {
        let decoded = decode(&self.compressed, self.sample_size * self.batch_size as usize);
        assert_eq!(decoded, self.appended);
    }
}

#[test]
fn repetitive_batches_round_trip_across_physical_wraparound() {
    // raw capacity far smaller than the total traffic, so the ring wraps
    // many times; capacity deliberately not a multiple of the sample size
    let mut bench = Bench::new(61, 61, 8, 3);
    for batch in 0u8..8 {
        for sample in 0u8..3 {
            let mut record = *b"ABCDEFGH";
            record[0] = b'A' + batch;
            record[7] = b'0' + sample;
            bench.push(&record);
        }
    }
    bench.check_round_trip();
}

#[test]
fn telemetry_records_round_trip_over_many_batches() {
    let mut rng = StdRng::seed_from_u64(0xB0B5_1ED5);
    let mut bench = Bench::new(512, 256, 19, 5);

    let mut soc: i16 = 80;
    let mut current: i16 = -500;
    for index in 0..200u16 {
        soc = (soc + rng.gen_range(-1..=1)).clamp(0, 100);
        current = (current + rng.gen_range(-40..=40)).clamp(-9999, 9999);
        let record = BatterySample {
            index,
            soc_percent: soc as u8,
            current_ma: current,
        }
        .encode();
        bench.push(&record);
    }
    bench.check_round_trip();
}

#[test]
fn incompressible_data_round_trips_as_literals() {
    let mut rng = StdRng::seed_from_u64(0x5EED_CAFE);
    let mut bench = Bench::new(256, 512, 19, 4);
    for _ in 0..40 {
        let mut record = [0u8; 19];
        rng.fill(&mut record[..]);
        bench.push(&record);
    }
    bench.check_round_trip();
}

#[test]
fn constant_data_respects_the_match_length_cap() {
    // all-identical bytes force maximal matches; the decoder asserts the
    // 263-byte cap on every token
    let mut bench = Bench::new(2048, 512, 19, 20);
    for _ in 0..40 {
        bench.push(&[b'Z'; 19]);
    }
    bench.check_round_trip();
    // one verbatim sample per batch plus a handful of match tokens
    assert!(bench.compressed.len() < bench.appended.len() / 4);
}

#[test]
fn failed_uplinks_replay_the_same_compressed_bytes() {
    let mut rng = StdRng::seed_from_u64(0x0FF1_CE00);
    let mut store = MemStore::new(1024);
    let mut raw = RingLog::new(Region::new(0, 512));
    let mut out = RingLog::new(Region::new(512, 512));
    let mut enc = Encoder::new(19, 5);

    let mut appended = Vec::new();
    let mut uploaded = Vec::new();
    for index in 0..100u16 {
        let record = BatterySample {
            index,
            soc_percent: 75,
            current_ma: -800,
        }
        .encode();
        raw.append(&mut store, &record).unwrap();
        appended.extend_from_slice(&record);
        assert!(enc.compress_sample(&mut store, &mut raw, &mut out).unwrap());

        // intermittent uplink: a failed transfer aborts and the next
        // attempt must carry the identical bytes
        let mut chunk = [0u8; 48];
        let n = out.read_into(&mut store, &mut chunk).unwrap();
        if rng.gen_bool(0.3) {
            out.abort();
        } else {
            uploaded.extend_from_slice(&chunk[..n]);
            out.commit();
        }
    }
    drain_all(&mut store, &mut out, &mut uploaded);

    assert_eq!(decode(&uploaded, 19 * 5), appended);
}

#[test]
fn sampling_through_a_long_stall_never_wedges_compression() {
    // the uplink goes down with the compressed region nearly full, and
    // sampling keeps appending until the raw ring laps the stalled
    // batch's origin; once the uplink recovers, compression must resume
    // and every appended byte must still decode
    let mut store = MemStore::new(128);
    let mut raw = RingLog::new(Region::new(0, 64));
    let mut out = RingLog::new(Region::new(64, 12));
    let mut enc = Encoder::new(8, 2);

    let mut appended = Vec::new();
    let mut record = *b"SAMPLE-0";
    let mut next = |appended: &mut Vec<u8>| {
        let current = record;
        record[7] += 1;
        appended.extend_from_slice(&current);
        current
    };

    raw.append(&mut store, &next(&mut appended)).unwrap();
    assert!(enc.compress_sample(&mut store, &mut raw, &mut out).unwrap());

    // second sample of the batch cannot fit its tokens: stall
    raw.append(&mut store, &next(&mut appended)).unwrap();
    assert_eq!(
        enc.compress_sample(&mut store, &mut raw, &mut out),
        Err(MemoryError::OutputFull)
    );

    // sampling continues through the outage and overwrites the batch
    // origin's bytes
    for _ in 0..7 {
        raw.append(&mut store, &next(&mut appended)).unwrap();
    }
    assert!(raw.oldest_pos() > 0);

    // uplink recovers: drain, then compression must make progress again
    let mut uploaded = Vec::new();
    drain_all(&mut store, &mut out, &mut uploaded);
    while enc.compress_sample(&mut store, &mut raw, &mut out).unwrap() {
        drain_all(&mut store, &mut out, &mut uploaded);
    }

    assert_eq!(raw.available(), 0);
    // the early-closed batch shifts every later batch boundary, so only
    // the byte-level round trip is checked here
    assert_eq!(decode(&uploaded, appended.len()), appended);
}

#[test]
fn output_full_backpressure_loses_nothing() {
    // compressed region far too small to hold a batch: the encoder must
    // report OutputFull, keep the sample in the raw log, and succeed once
    // the uplink drains the backlog
    let mut store = MemStore::new(512);
    let mut raw = RingLog::new(Region::new(0, 256));
    let mut out = RingLog::new(Region::new(256, 40));
    let mut enc = Encoder::new(19, 4);

    let mut appended = Vec::new();
    let mut uploaded = Vec::new();
    for index in 0..24u16 {
        let record = BatterySample {
            index,
            soc_percent: 50,
            current_ma: 1500,
        }
        .encode();
        raw.append(&mut store, &record).unwrap();
        appended.extend_from_slice(&record);

        loop {
            match enc.compress_sample(&mut store, &mut raw, &mut out) {
                Ok(true) => break,
                Ok(false) => unreachable!("a full sample is buffered"),
                Err(MemoryError::OutputFull) => {
                    drain_all(&mut store, &mut out, &mut uploaded);
                }
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
    }
    drain_all(&mut store, &mut out, &mut uploaded);

    assert_eq!(decode(&uploaded, 19 * 4), appended);
}
