//! Time-sampled progress reporting for a byte stream of known length.
//!
//! A [`ProgressTracker`] counts bytes as they pass through a
//! [`ProgressReader`] and hands a [`ProgressState`] snapshot to its subscriber
//! at most once per sampling interval. The bytes themselves are never touched.
use std::fmt;
use std::io::{self, Read};
use std::time::{Duration, Instant};

use crate::error::WriteError;

/// Sampling interval used when the caller does not pick one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// A snapshot of a transfer in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressState {
    /// Bytes moved so far.
    pub transferred: u64,
    /// Declared length of the stream.
    pub total: u64,
    /// `total - transferred`.
    pub remaining: u64,
    /// `transferred / total` as a value in `0.0..=100.0`.
    pub percentage: f64,
    /// Bytes moved since the previous snapshot.
    pub delta: u64,
    /// Average throughput in bytes per second.
    pub speed: f64,
    /// Estimated time left at the current speed.
    pub eta: Duration,
    /// Time since the transfer started.
    pub runtime: Duration,
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} bytes ({:.1}%, {:.0} B/s, eta {}s)",
            self.transferred,
            self.total,
            self.percentage,
            self.speed,
            self.eta.as_secs()
        )
    }
}

type Subscriber<'a> = Box<dyn FnMut(&ProgressState) + 'a>;

/// Counts transferred bytes and emits periodic [`ProgressState`] snapshots.
pub struct ProgressTracker<'a> {
    total: u64,
    interval: Duration,
    transferred: u64,
    reported: Option<u64>,
    started: Instant,
    last_emit: Instant,
    subscriber: Option<Subscriber<'a>>,
}

impl<'a> ProgressTracker<'a> {
    /// Creates a tracker for a stream of `total` bytes sampled every `interval`.
    pub fn new(total: u64, interval: Duration) -> Result<Self, WriteError> {
        if interval.is_zero() {
            return Err(WriteError::InvalidParameter {
                name: "interval",
                value: format!("{interval:?}"),
                reason: "not a positive duration",
            });
        }

        let now = Instant::now();
        Ok(Self {
            total,
            interval,
            transferred: 0,
            reported: None,
            started: now,
            last_emit: now,
            subscriber: None,
        })
    }

    /// Registers the callback that receives snapshots. Without one, the
    /// tracker still counts bytes but emits nothing.
    pub fn subscribe(&mut self, on_progress: impl FnMut(&ProgressState) + 'a) {
        self.subscriber = Some(Box::new(on_progress));
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Records `bytes` more bytes, emitting a snapshot if the interval elapsed.
    pub fn advance(&mut self, bytes: u64) {
        self.record(bytes, Instant::now());
    }

    /// Emits the terminal snapshot unless one was already sent for the
    /// current byte count.
    pub fn finish(&mut self) {
        if self.reported != Some(self.transferred) {
            self.emit(Instant::now());
        }
    }

    fn record(&mut self, bytes: u64, now: Instant) {
        self.transferred = self.transferred.saturating_add(bytes);
        if now.saturating_duration_since(self.last_emit) >= self.interval {
            self.emit(now);
        }
    }

    fn emit(&mut self, now: Instant) {
        let state = self.snapshot(now);
        self.reported = Some(self.transferred);
        self.last_emit = now;
        if let Some(subscriber) = self.subscriber.as_mut() {
            subscriber(&state);
        }
    }

    fn snapshot(&self, now: Instant) -> ProgressState {
        let runtime = now.saturating_duration_since(self.started);
        let remaining = self.total.saturating_sub(self.transferred);

        let percentage = if self.total > 0 {
            (self.transferred as f64 / self.total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let secs = runtime.as_secs_f64();
        let speed = if secs > 0.0 {
            self.transferred as f64 / secs
        } else {
            0.0
        };
        let eta = if speed > 0.0 {
            Duration::from_secs_f64(remaining as f64 / speed)
        } else {
            Duration::ZERO
        };

        ProgressState {
            transferred: self.transferred,
            total: self.total,
            remaining,
            percentage,
            delta: self.transferred - self.reported.unwrap_or(0),
            speed,
            eta,
            runtime,
        }
    }
}

/// A [`Read`] adapter that reports every byte it yields to a tracker.
pub struct ProgressReader<'t, 'a, R> {
    inner: R,
    tracker: &'t mut ProgressTracker<'a>,
}

impl<'t, 'a, R: Read> ProgressReader<'t, 'a, R> {
    pub fn new(inner: R, tracker: &'t mut ProgressTracker<'a>) -> Self {
        Self { inner, tracker }
    }
}

impl<R: Read> Read for ProgressReader<'_, '_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.tracker.advance(n as u64);
        Ok(n)
    }
}
