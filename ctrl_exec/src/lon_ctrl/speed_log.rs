//! # Speed log
//!
//! Per-cycle diagnostic record of the longitudinal controller, and the sinks
//! it can be written to. Logging is best effort: a sink that fails only
//! warns, the control cycle carries on regardless. The threaded log queues a
//! bounded number of records and drops new ones while the queue is full, so a
//! slow sink never stalls the control cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use std::{
    sync::mpsc::{sync_channel, SyncSender, TrySendError},
    thread::{self, JoinHandle},
};

// Internal
use comms_if::ctrl::LonDebug;
use util::archive::Archiver;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default number of records the threaded log can hold before dropping.
pub const SPEED_LOG_QUEUE_LEN: usize = 1024;

/// A warning is issued for the first dropped record and then every this many.
const DROP_WARN_INTERVAL: u64 = 100;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One row of the speed log.
///
/// Field order is the column order of the log.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct SpeedLogRecord {
    pub station_reference: f64,
    pub station_error: f64,
    pub station_error_limited: f64,
    pub preview_station_error: f64,
    pub speed_reference: f64,
    pub speed_error: f64,
    pub speed_error_limited: f64,
    pub preview_speed_reference: f64,
    pub preview_speed_error: f64,
    pub preview_acceleration_reference: f64,
    pub acceleration_cmd_closeloop: f64,
    pub acceleration_cmd: f64,
    pub acceleration_lookup: f64,
    pub acceleration_lookup_limit: f64,
    pub speed_lookup: f64,
    pub calibration_value: f64,
    pub throttle_cmd: f64,
    pub brake_cmd: f64,
    pub is_full_stop: u8,
}

/// Speed log written synchronously to a CSV archive.
pub struct CsvSpeedLog {
    arch: Option<Archiver>,
}

/// Speed log which hands records to another sink running on a background
/// thread.
pub struct ThreadedSpeedLog {
    sender: Option<SyncSender<SpeedLogSignal>>,
    worker_jh: Option<JoinHandle<()>>,

    /// Number of records dropped because the queue was full
    num_dropped: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

enum SpeedLogSignal {
    Record(SpeedLogRecord),
    Stop,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A destination for speed log records.
pub trait SpeedLogSink: Send {
    /// Write a record to the sink.
    fn log(&mut self, record: &SpeedLogRecord);

    /// Flush and release the sink, further records are dropped.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl From<&LonDebug> for SpeedLogRecord {
    fn from(dbg: &LonDebug) -> Self {
        Self {
            station_reference: dbg.station_reference,
            station_error: dbg.station_error,
            station_error_limited: dbg.station_error_limited,
            preview_station_error: dbg.preview_station_error,
            speed_reference: dbg.speed_reference,
            speed_error: dbg.speed_error,
            speed_error_limited: dbg.speed_controller_input_limited,
            preview_speed_reference: dbg.preview_speed_reference,
            preview_speed_error: dbg.preview_speed_error,
            preview_acceleration_reference: dbg.preview_acceleration_reference,
            acceleration_cmd_closeloop: dbg.acceleration_cmd_closeloop,
            acceleration_cmd: dbg.acceleration_cmd,
            acceleration_lookup: dbg.acceleration_lookup,
            acceleration_lookup_limit: dbg.acceleration_lookup_limit,
            speed_lookup: dbg.speed_lookup,
            calibration_value: dbg.calibration_value,
            throttle_cmd: dbg.throttle_cmd,
            brake_cmd: dbg.brake_cmd,
            is_full_stop: dbg.is_full_stop as u8,
        }
    }
}

impl CsvSpeedLog {
    pub fn new(arch: Archiver) -> Self {
        Self { arch: Some(arch) }
    }
}

impl SpeedLogSink for CsvSpeedLog {
    fn log(&mut self, record: &SpeedLogRecord) {
        if let Some(ref mut arch) = self.arch {
            if let Err(e) = arch.serialise(record) {
                warn!("Could not write to the speed log: {}", e);
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut arch) = self.arch.take() {
            if let Err(e) = arch.flush() {
                warn!("Could not flush the speed log: {}", e);
            }
        }
    }
}

impl ThreadedSpeedLog {
    /// Start a background thread writing records into `sink`, with a queue
    /// of `SPEED_LOG_QUEUE_LEN` records.
    pub fn new(sink: Box<dyn SpeedLogSink>) -> Self {
        Self::with_capacity(sink, SPEED_LOG_QUEUE_LEN)
    }

    /// Start a background thread writing records into `sink`, queueing at
    /// most `capacity` records (at least one).
    pub fn with_capacity(mut sink: Box<dyn SpeedLogSink>, capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity.max(1));

        let worker_jh = thread::spawn(move || {
            while let Ok(signal) = receiver.recv() {
                match signal {
                    SpeedLogSignal::Record(record) => sink.log(&record),
                    SpeedLogSignal::Stop => break,
                }
            }
            sink.close();
            debug!("Speed log worker stopped");
        });

        Self {
            sender: Some(sender),
            worker_jh: Some(worker_jh),
            num_dropped: 0,
        }
    }

    /// Number of records dropped so far because the queue was full.
    pub fn num_dropped(&self) -> u64 {
        self.num_dropped
    }
}

impl SpeedLogSink for ThreadedSpeedLog {
    fn log(&mut self, record: &SpeedLogRecord) {
        if let Some(ref sender) = self.sender {
            match sender.try_send(SpeedLogSignal::Record(*record)) {
                Ok(()) => (),
                Err(TrySendError::Full(_)) => {
                    self.num_dropped += 1;
                    if self.num_dropped % DROP_WARN_INTERVAL == 1 {
                        warn!(
                            "Speed log queue is full, {} record(s) dropped so far",
                            self.num_dropped
                        );
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("Speed log worker has stopped, record dropped")
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(sender) = self.sender.take() {
            // Blocks until the worker has room, it drains the queue before
            // stopping. If the worker has already exited there's nothing
            // left to stop.
            sender.send(SpeedLogSignal::Stop).ok();
        }

        if let Some(jh) = self.worker_jh.take() {
            if jh.join().is_err() {
                warn!("Speed log worker panicked");
            }
        }
    }
}

impl Drop for ThreadedSpeedLog {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
