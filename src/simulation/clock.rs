//! Wall-clock frame timer

use std::time::Instant;

/// Tracks the delta between ticks and total running time
///
/// The clock is only advanced while the host is running, so time spent paused
/// is not counted as one huge frame.
#[derive(Debug, Clone)]
pub struct Clock {
    last: Option<Instant>,
    delta: f32,
    elapsed: f32,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            last: None,
            delta: 0.0,
            elapsed: 0.0,
        }
    }

    /// Advance to `now` and return the delta in seconds
    pub fn update(&mut self, now: Instant) -> f32 {
        self.delta = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last = Some(now);
        self.elapsed += self.delta;
        self.delta
    }

    /// Forget the last tick so the next one after a pause reports zero delta
    pub fn stop(&mut self) {
        self.last = None;
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_accumulates_and_restarts() {
        let start = Instant::now();
        let mut clock = Clock::new();
        assert_eq!(clock.update(start), 0.0);
        let delta = clock.update(start + Duration::from_millis(250));
        assert!((delta - 0.25).abs() < 1e-6);

        clock.stop();
        assert_eq!(clock.update(start + Duration::from_secs(10)), 0.0);
        assert!((clock.elapsed() - 0.25).abs() < 1e-6);
    }
}
