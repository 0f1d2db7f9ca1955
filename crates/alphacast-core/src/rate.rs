//! Throughput monitor for the broadcast loop
//!
//! Counts frames and bytes and produces one [`RateReport`] per reporting
//! window (5 seconds). The caller decides what to do with the report.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Minimum time between two reports
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Throughput summary for one reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateReport {
    /// Frames per second over the window
    pub fps: f64,
    /// Average encoded payload size
    pub avg_bytes_per_frame: f64,
    /// Connected viewers at the time of the report
    pub channels: usize,
    /// Frames counted in the window
    pub frames: u64,
    /// Window length in seconds
    pub window_secs: f64,
    /// RFC 3339 time the report was produced
    pub timestamp: String,
}

/// Rolling frame/byte counter
#[derive(Debug)]
pub struct RateMonitor {
    frames: u64,
    bytes: u64,
    window_start: Instant,
    interval: Duration,
}

impl Default for RateMonitor {
    fn default() -> Self {
        RateMonitor::new()
    }
}

impl RateMonitor {
    pub fn new() -> Self {
        RateMonitor::starting_at(Instant::now())
    }

    /// Monitor whose first window starts at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            frames: 0,
            bytes: 0,
            window_start: start,
            interval: REPORT_INTERVAL,
        }
    }

    /// Record one encoded frame now
    pub fn record(&mut self, bytes: usize, channels: usize) -> Option<RateReport> {
        self.record_at(Instant::now(), bytes, channels)
    }

    /// Record one encoded frame at `now`
    ///
    /// Returns a report and starts a new window once at least
    /// [`REPORT_INTERVAL`] has passed since the window started.
    pub fn record_at(&mut self, now: Instant, bytes: usize, channels: usize) -> Option<RateReport> {
        self.frames += 1;
        self.bytes += bytes as u64;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let report = RateReport {
            fps: self.frames as f64 / secs,
            avg_bytes_per_frame: self.bytes as f64 / self.frames as f64,
            channels,
            frames: self.frames,
            window_secs: secs,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        self.frames = 0;
        self.bytes = 0;
        self.window_start = now;

        Some(report)
    }

    /// Frames counted in the current window
    pub fn pending_frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifty_frames_in_five_seconds() {
        let start = Instant::now();
        let mut monitor = RateMonitor::starting_at(start);

        let mut reports = Vec::new();
        for i in 1..=50u64 {
            let now = start + Duration::from_millis(i * 100);
            if let Some(report) = monitor.record_at(now, 1000, 3) {
                reports.push(report);
            }
        }

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!((report.fps - 10.0).abs() < 1e-9, "fps was {}", report.fps);
        assert_eq!(report.avg_bytes_per_frame, 1000.0);
        assert_eq!(report.channels, 3);
        assert_eq!(report.frames, 50);
    }

    #[test]
    fn test_no_report_inside_window() {
        let start = Instant::now();
        let mut monitor = RateMonitor::starting_at(start);

        for i in 0..10u64 {
            let now = start + Duration::from_millis(i * 400);
            assert!(monitor.record_at(now, 500, 1).is_none());
        }
        assert_eq!(monitor.pending_frames(), 10);
    }

    #[test]
    fn test_counters_reset_after_report() {
        let start = Instant::now();
        let mut monitor = RateMonitor::starting_at(start);

        let first = monitor.record_at(start + Duration::from_secs(6), 100, 1);
        assert!(first.is_some());
        assert_eq!(monitor.pending_frames(), 0);

        // New window starts at the report time
        let early = monitor.record_at(start + Duration::from_secs(8), 100, 1);
        assert!(early.is_none());

        let second = monitor
            .record_at(start + Duration::from_secs(11), 300, 2)
            .unwrap();
        assert_eq!(second.frames, 2);
        assert_eq!(second.avg_bytes_per_frame, 200.0);
        assert_eq!(second.channels, 2);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let start = Instant::now();
        let mut monitor = RateMonitor::starting_at(start);
        let report = monitor
            .record_at(start + Duration::from_secs(5), 2048, 4)
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["channels"], 4);
        assert_eq!(json["frames"], 1);
        assert!(json["timestamp"].as_str().unwrap().contains('T'));

        let back: RateReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
