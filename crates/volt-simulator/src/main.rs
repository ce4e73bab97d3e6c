//! Host simulator for the volt-rs battery telemetry logger.
//!
//! Runs the full firmware control flow against a RAM-backed store:
//! synthetic battery readings are appended to the raw ring log, the
//! streaming encoder drains them into the compressed region, and a fake
//! uplink with injected failures reports the compressed bytes with
//! commit/abort retry semantics — all driven by the cooperative tick
//! scheduler, one simulated tick per loop iteration.
//!
//! Usage: `volt-simulator [TICKS]` (default 3600, one tick per simulated
//! second). Set `RUST_LOG=debug` for per-task activity.

use std::env;
use std::process::ExitCode;

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use volt_core::MemoryError;
use volt_core::compress::Encoder;
use volt_core::config::{BATCH_SIZE, MEMORY_SIZE, MemoryMap, SAMPLE_SIZE};
use volt_core::sample::BatterySample;
use volt_core::sched::{Scheduler, Ticker};
use volt_core::store::{ByteStore, MemStore, RingLog};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Default simulated run length.
const DEFAULT_TICKS: u32 = 3600;

/// One sample per tick, matching the 1 Hz sampling of the field device.
const SAMPLE_PERIOD: u32 = 1;

/// Compression keeps pace with sampling.
const COMPRESS_PERIOD: u32 = 1;

/// Reporting window: one uplink attempt per minute of simulated time.
const REPORT_PERIOD: u32 = 60;

/// Bytes per uplink transfer.
const UPLINK_CHUNK: usize = 48;

/// Fraction of uplink transfers that fail and must be replayed.
const UPLINK_FAILURE_RATE: f64 = 0.15;

// ---------------------------------------------------------------------------
// Synthetic battery box
// ---------------------------------------------------------------------------

/// Generates battery readings that vary plausibly over time: a slow
/// charge/discharge cycle with ripple on the current.
struct MockBatteryBox {
    index: u16,
    elapsed_secs: f64,
}

impl MockBatteryBox {
    fn new() -> Self {
        Self {
            index: 0,
            elapsed_secs: 0.0,
        }
    }

    fn next_sample(&mut self, dt_secs: f64) -> BatterySample {
        self.elapsed_secs += dt_secs;
        let t = self.elapsed_secs;

        // SoC: 30–90 % over a two-hour charge/discharge cycle
        let soc = 60.0 + 30.0 * (t / 7200.0 * core::f64::consts::TAU).sin();

        // Current: charging or discharging with the cycle, plus ripple
        let current =
            -2000.0 * (t / 7200.0 * core::f64::consts::TAU).cos() + 150.0 * (t / 13.0).sin();

        let sample = BatterySample {
            index: self.index,
            soc_percent: soc.clamp(0.0, 100.0) as u8,
            current_ma: current.clamp(-9999.0, 9999.0) as i16,
        };
        self.index = self.index.wrapping_add(1);
        sample
    }
}

// ---------------------------------------------------------------------------
// Fake uplink
// ---------------------------------------------------------------------------

/// Wide-area uplink stand-in: delivers chunks, dropping a fixed fraction
/// of transfers so the replay path gets exercised.
struct FakeUplink {
    rng: StdRng,
    delivered: u64,
    failures: u32,
}

impl FakeUplink {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            delivered: 0,
            failures: 0,
        }
    }

    /// Attempt to send one chunk; `false` means the transfer was lost.
    fn send(&mut self, chunk: &[u8]) -> bool {
        if self.rng.gen_bool(UPLINK_FAILURE_RATE) {
            self.failures += 1;
            false
        } else {
            self.delivered += chunk.len() as u64;
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

struct Device {
    store: MemStore,
    raw: RingLog,
    compressed: RingLog,
    encoder: Encoder,
    battery_box: MockBatteryBox,
    uplink: FakeUplink,
    samples_dropped: u32,
}

impl Device {
    fn new(uplink_seed: u64) -> Result<Self, MemoryError> {
        let mut store = MemStore::new(MEMORY_SIZE);
        store.start()?;
        store.erase_all()?;

        let map = MemoryMap::default_map();
        Ok(Self {
            store,
            raw: RingLog::new(map.raw),
            compressed: RingLog::new(map.compressed),
            encoder: Encoder::new(SAMPLE_SIZE, BATCH_SIZE),
            battery_box: MockBatteryBox::new(),
            uplink: FakeUplink::new(uplink_seed),
            samples_dropped: 0,
        })
    }

    /// Poll the battery box and append one record to the raw log. A full
    /// ring drops this cycle's sample; the device keeps running.
    fn sampling_task(&mut self) {
        let sample = self.battery_box.next_sample(SAMPLE_PERIOD as f64);
        debug!("sampled {sample}");
        match self.raw.append(&mut self.store, &sample.encode()) {
            Ok(()) => {}
            Err(MemoryError::RingFull) => {
                self.samples_dropped += 1;
                warn!("raw log full, sample {} dropped", sample.index);
            }
            Err(e) => error!("sample append failed: {e}"),
        }
    }

    /// Drain whole samples through the encoder while input is available.
    /// `OutputFull` is back-pressure, not an error: the sample stays in
    /// the raw log until the uplink frees compressed space.
    fn compression_task(&mut self) {
        loop {
            match self
                .encoder
                .compress_sample(&mut self.store, &mut self.raw, &mut self.compressed)
            {
                Ok(true) => {}
                Ok(false) => break,
                Err(MemoryError::OutputFull) => {
                    debug!("compressed region full, deferring");
                    break;
                }
                Err(e) => {
                    error!("compression failed: {e}");
                    break;
                }
            }
        }
    }

    /// Push compressed bytes over the uplink in fixed-size chunks,
    /// committing after each delivered chunk and aborting on a lost one
    /// so the next attempt replays the identical bytes.
    fn reporting_task(&mut self) {
        loop {
            let mut chunk = [0u8; UPLINK_CHUNK];
            let n = match self.compressed.read_into(&mut self.store, &mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    error!("compressed read failed: {e}");
                    self.compressed.abort();
                    break;
                }
            };
            if self.uplink.send(&chunk[..n]) {
                self.compressed.commit();
                debug!("uplinked {n} bytes");
            } else {
                self.compressed.abort();
                warn!("uplink transfer lost, will replay");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();

    let ticks = match env::args().nth(1) {
        None => DEFAULT_TICKS,
        Some(arg) => match arg.parse() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("usage: volt-simulator [TICKS]");
                return ExitCode::FAILURE;
            }
        },
    };

    info!("starting volt simulator for {ticks} ticks");

    let mut device = match Device::new(0xF1E1D_DA7A) {
        Ok(device) => device,
        Err(e) => {
            error!("storage init failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ticker = Ticker::new();
    let mut sched = Scheduler::new();
    let now = ticker.now();
    let sample_id = sched.add(now, 0, SAMPLE_PERIOD).unwrap();
    let compress_id = sched.add(now, 0, COMPRESS_PERIOD).unwrap();
    let report_id = sched.add(now, REPORT_PERIOD, REPORT_PERIOD).unwrap();

    for _ in 0..ticks {
        // hardware would post this from a timer interrupt
        ticker.post();
        let now = ticker.now();
        while let Some(id) = sched.next_ready(now) {
            match id {
                id if id == sample_id => device.sampling_task(),
                id if id == compress_id => device.compression_task(),
                id if id == report_id => device.reporting_task(),
                _ => unreachable!(),
            }
        }
    }
    // flush whatever the last partial reporting window left behind
    device.reporting_task();

    let stats = device.encoder.stats();
    let ratio = if stats.raw_in > 0 {
        stats.compressed_out as f64 / stats.raw_in as f64
    } else {
        0.0
    };
    info!(
        "done: {} raw bytes -> {} compressed ({:.1} %), {} uplinked, {} transfers lost, {} samples dropped",
        stats.raw_in,
        stats.compressed_out,
        ratio * 100.0,
        device.uplink.delivered,
        device.uplink.failures,
        device.samples_dropped,
    );
    ExitCode::SUCCESS
}
