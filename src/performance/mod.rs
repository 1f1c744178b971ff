//! # Frame statistics
//!
//! Tracks frame times over a short window and logs a summary at `debug`
//! roughly once per second.
//!
//! ```rust
//! use etherflow::performance::PerformanceMonitor;
//! use std::time::Instant;
//!
//! let mut monitor = PerformanceMonitor::new();
//! let start = Instant::now();
//! // ... tick and render ...
//! monitor.record_frame(start, Instant::now());
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Summary of the recent frame window
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    /// Frames per second derived from the average frame time
    pub fps: f32,
    /// Average frame time in milliseconds
    pub frame_time_ms: f32,
    pub min_frame_time_ms: f32,
    pub max_frame_time_ms: f32,
    /// Frames recorded since creation
    pub frame_count: u64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            fps: 0.0,
            frame_time_ms: 0.0,
            min_frame_time_ms: 0.0,
            max_frame_time_ms: 0.0,
            frame_count: 0,
        }
    }
}

pub struct PerformanceMonitor {
    /// Ring buffer of recent frame times
    frame_times: VecDeque<Duration>,
    max_samples: usize,
    metrics: PerformanceMetrics,
    last_report: Option<Instant>,
    report_interval: Duration,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::with_config(120, Duration::from_secs(1))
    }

    pub fn with_config(max_samples: usize, report_interval: Duration) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            metrics: PerformanceMetrics::default(),
            last_report: None,
            report_interval,
        }
    }

    /// Record one frame that ran from `start` to `end`.
    ///
    /// Returns `true` when a summary was logged for this frame.
    pub fn record_frame(&mut self, start: Instant, end: Instant) -> bool {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times
            .push_back(end.saturating_duration_since(start));
        self.metrics.frame_count += 1;

        let due = self
            .last_report
            .is_none_or(|at| end.saturating_duration_since(at) >= self.report_interval);
        if !due {
            return false;
        }
        self.last_report = Some(end);
        self.update_metrics();
        log::debug!(
            "{:.1} fps, frame {:.2}ms (min {:.2}, max {:.2})",
            self.metrics.fps,
            self.metrics.frame_time_ms,
            self.metrics.min_frame_time_ms,
            self.metrics.max_frame_time_ms
        );
        true
    }

    fn update_metrics(&mut self) {
        if self.frame_times.is_empty() {
            return;
        }

        let total: Duration = self.frame_times.iter().sum();
        let average_ms = total.as_secs_f32() * 1000.0 / self.frame_times.len() as f32;
        self.metrics.frame_time_ms = average_ms;
        self.metrics.fps = if average_ms > 0.0 {
            1000.0 / average_ms
        } else {
            0.0
        };

        if let (Some(min), Some(max)) = (self.frame_times.iter().min(), self.frame_times.iter().max())
        {
            self.metrics.min_frame_time_ms = min.as_secs_f32() * 1000.0;
            self.metrics.max_frame_time_ms = max.as_secs_f32() * 1000.0;
        }
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.metrics = PerformanceMetrics::default();
        self.last_report = None;
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
