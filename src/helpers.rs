use std::time::{Duration, Instant};

/// Ticks-per-second over a sliding one-second window, as shown in the
/// window title of the render loop.
pub struct RateMeter {
    window: Duration,
    window_start: Instant,
    ticks: u32,
    rate: f64,
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: Instant::now(),
            ticks: 0,
            rate: 0.0,
        }
    }

    /// Records one tick. Returns the new rate whenever a window closes.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.ticks += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        self.rate = self.ticks as f64 / elapsed.as_secs_f64();
        self.ticks = 0;
        self.window_start = now;
        Some(self.rate)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_reported_once_per_window() {
        let start = Instant::now();
        let mut meter = RateMeter::new(Duration::from_secs(1));
        meter.window_start = start;

        for i in 1..10 {
            assert_eq!(meter.tick_at(start + Duration::from_millis(i * 100)), None);
        }
        let rate = meter.tick_at(start + Duration::from_secs(1)).unwrap();
        assert!((rate - 10.0).abs() < 1e-9);
        assert_eq!(meter.rate(), rate);
        assert_eq!(meter.tick_at(start + Duration::from_millis(1100)), None);
    }
}
