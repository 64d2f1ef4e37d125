//! Frame timing for animation and frame-rate reporting.

use std::time::{Duration, Instant};

/// Tracks total running time and frames presented per reporting window.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    window_start: Instant,
    frames_in_window: u32,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            window_start: now,
            frames_in_window: 0,
        }
    }

    /// Total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total elapsed time in seconds, used to drive the model rotation.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Count one finished frame.
    ///
    /// Returns the average frame rate once at least `interval` has passed
    /// since the last report, then starts a new window.
    pub fn frame(&mut self, interval: Duration) -> Option<f32> {
        self.frames_in_window += 1;
        let window = self.window_start.elapsed();
        if window < interval {
            return None;
        }

        let fps = self.frames_in_window as f32 / window.as_secs_f32();
        self.window_start = Instant::now();
        self.frames_in_window = 0;
        Some(fps)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_reports_only_after_interval() {
        let mut timer = Timer::new();
        assert!(timer.frame(Duration::from_secs(3600)).is_none());
        assert!(timer.frame(Duration::from_secs(3600)).is_none());
    }

    #[test]
    fn test_frame_reports_with_zero_interval() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        let fps = timer.frame(Duration::ZERO);
        assert!(fps.is_some_and(|fps| fps > 0.0));
        assert_eq!(timer.frames_in_window, 0);
    }
}
