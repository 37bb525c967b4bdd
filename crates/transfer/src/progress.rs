use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::events::{EventSink, FailureReason, TransferEvent};

/// Point-in-time view of a session's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub file_name: Option<String>,
    pub file_bytes: u64,
    pub file_size: u64,
    pub files_done: usize,
    /// Bytes of completed files plus the file in flight.
    pub bytes_done: u64,
    pub bytes_per_second: f64,
    pub finished: bool,
    pub failure: Option<FailureReason>,
}

/// Folds session events into running totals.
///
/// Usable directly as an [`EventSink`], or fed by hand from a channel.
#[derive(Debug)]
pub struct ProgressTracker {
    file_name: Option<String>,
    file_bytes: u64,
    file_size: u64,
    files_done: usize,
    completed_bytes: u64,
    speed: SpeedCalculator,
    finished: bool,
    failure: Option<FailureReason>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            file_name: None,
            file_bytes: 0,
            file_size: 0,
            files_done: 0,
            completed_bytes: 0,
            speed: SpeedCalculator::new(None, None),
            finished: false,
            failure: None,
        }
    }

    pub fn observe(&mut self, event: &TransferEvent) {
        self.observe_at(event, Instant::now());
    }

    fn observe_at(&mut self, event: &TransferEvent, now: Instant) {
        match event {
            TransferEvent::FileIncoming { name, size }
            | TransferEvent::FileOutgoing { name, size } => {
                self.file_name = Some(name.clone());
                self.file_size = *size;
                self.file_bytes = 0;
            }
            TransferEvent::FileProcessed {
                bytes_transferred,
                file_size,
            } => {
                let delta = bytes_transferred.saturating_sub(self.file_bytes);
                self.speed.add_sample_at(delta, now);
                self.file_bytes = *bytes_transferred;
                self.file_size = *file_size;
            }
            TransferEvent::FileReceived {
                bytes_transferred, ..
            }
            | TransferEvent::FileSent {
                bytes_transferred, ..
            } => {
                self.files_done += 1;
                self.completed_bytes += self.file_size.max(*bytes_transferred);
                self.file_name = None;
                self.file_bytes = 0;
                self.file_size = 0;
            }
            TransferEvent::TransferCompleted => self.finished = true,
            TransferEvent::TransferFailed { reason, .. } => {
                self.finished = true;
                self.failure = Some(*reason);
            }
        }
    }

    /// Percentage of the file in flight, 0.0 to 100.0.
    pub fn percent(&self) -> f64 {
        if self.file_size == 0 {
            return 0.0;
        }
        self.file_bytes as f64 / self.file_size as f64 * 100.0
    }

    /// Estimated time to finish the file in flight.
    pub fn eta(&self) -> Option<Duration> {
        self.speed
            .eta(self.file_size.saturating_sub(self.file_bytes))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            file_name: self.file_name.clone(),
            file_bytes: self.file_bytes,
            file_size: self.file_size,
            files_done: self.files_done,
            bytes_done: self.completed_bytes + self.file_bytes,
            bytes_per_second: self.speed.bytes_per_second(),
            finished: self.finished,
            failure: self.failure,
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressTracker {
    fn emit(&mut self, event: TransferEvent) {
        self.observe(&event);
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
#[derive(Debug)]
pub struct SpeedCalculator {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: max_samples.unwrap_or(100).max(2),
            window_size: window_size.unwrap_or(Duration::from_secs(5)),
        }
    }

    /// Records a sample of `bytes` transferred at the current instant.
    pub fn add_sample(&mut self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&mut self, bytes: u64, now: Instant) {
        self.samples.push_back(SpeedSample {
            bytes,
            timestamp: now,
        });

        // Prune samples outside the window.
        while let Some(front) = self.samples.front() {
            if now.duration_since(front.timestamp) > self.window_size {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        // The first sample only marks the start of the window.
        let total_bytes: u64 = self.samples.iter().skip(1).map(|s| s.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed(bytes: u64, size: u64) -> TransferEvent {
        TransferEvent::FileProcessed {
            bytes_transferred: bytes,
            file_size: size,
        }
    }

    #[test]
    fn tracker_follows_one_file() {
        let mut tracker = ProgressTracker::new();
        tracker.emit(TransferEvent::FileIncoming {
            name: "demo.bin".into(),
            size: 1000,
        });
        tracker.emit(processed(256, 1000));
        assert!((tracker.percent() - 25.6).abs() < 1e-9);

        let snap = tracker.snapshot();
        assert_eq!(snap.file_name.as_deref(), Some("demo.bin"));
        assert_eq!(snap.bytes_done, 256);
        assert!(!snap.finished);

        tracker.emit(processed(1000, 1000));
        tracker.emit(TransferEvent::FileReceived {
            name: "demo.bin".into(),
            bytes_transferred: 1000,
        });
        tracker.emit(TransferEvent::TransferCompleted);

        let snap = tracker.snapshot();
        assert_eq!(snap.files_done, 1);
        assert_eq!(snap.bytes_done, 1000);
        assert_eq!(snap.file_name, None);
        assert!(snap.finished);
        assert_eq!(snap.failure, None);
    }

    #[test]
    fn tracker_sums_across_files() {
        let mut tracker = ProgressTracker::new();
        for (name, size) in [("a", 100u64), ("b", 200)] {
            tracker.emit(TransferEvent::FileOutgoing {
                name: name.into(),
                size,
            });
            tracker.emit(processed(size, size));
            tracker.emit(TransferEvent::FileSent {
                name: name.into(),
                bytes_transferred: size,
            });
        }
        assert_eq!(tracker.snapshot().bytes_done, 300);
        assert_eq!(tracker.snapshot().files_done, 2);
    }

    #[test]
    fn tracker_counts_skipped_file_as_done() {
        let mut tracker = ProgressTracker::new();
        tracker.emit(TransferEvent::FileOutgoing {
            name: "same.bin".into(),
            size: 500,
        });
        tracker.emit(TransferEvent::FileSent {
            name: "same.bin".into(),
            bytes_transferred: 0,
        });
        assert_eq!(tracker.snapshot().bytes_done, 500);
    }

    #[test]
    fn tracker_records_failure() {
        let mut tracker = ProgressTracker::new();
        tracker.emit(TransferEvent::TransferFailed {
            reason: FailureReason::ConnectionLost,
            message: "reset".into(),
        });
        let snap = tracker.snapshot();
        assert!(snap.finished);
        assert_eq!(snap.failure, Some(FailureReason::ConnectionLost));
    }

    #[test]
    fn percent_of_empty_file_is_zero() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.percent(), 0.0);
        assert!(tracker.eta().is_none());
    }

    #[test]
    fn speed_calculator_no_samples() {
        let calc = SpeedCalculator::new(None, None);
        assert_eq!(calc.bytes_per_second(), 0.0);
        assert!(calc.eta(1000).is_none());
    }

    #[test]
    fn speed_calculator_single_sample() {
        let mut calc = SpeedCalculator::new(None, None);
        calc.add_sample(100);
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_calculator_steady_rate() {
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(10)), None);
        let t0 = Instant::now();
        calc.add_sample_at(256, t0);
        calc.add_sample_at(500, t0 + Duration::from_millis(500));
        calc.add_sample_at(500, t0 + Duration::from_secs(1));

        assert_eq!(calc.bytes_per_second(), 1000.0);
        assert_eq!(calc.eta(2000), Some(Duration::from_secs(2)));
    }

    #[test]
    fn speed_calculator_drops_old_samples() {
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(1)), None);
        let t0 = Instant::now();
        calc.add_sample_at(10_000, t0);
        calc.add_sample_at(100, t0 + Duration::from_secs(5));
        calc.add_sample_at(100, t0 + Duration::from_secs(6));

        assert_eq!(calc.samples.len(), 2);
        assert_eq!(calc.bytes_per_second(), 100.0);
    }

    #[test]
    fn speed_calculator_max_samples() {
        let mut calc = SpeedCalculator::new(Some(Duration::from_secs(60)), Some(5));
        for i in 0..20 {
            calc.add_sample(i * 10);
        }
        assert!(calc.samples.len() <= 5);
    }

    #[test]
    fn speed_calculator_reset() {
        let mut calc = SpeedCalculator::new(None, None);
        calc.add_sample(100);
        calc.add_sample(200);
        calc.reset();
        assert_eq!(calc.bytes_per_second(), 0.0);
    }
}
