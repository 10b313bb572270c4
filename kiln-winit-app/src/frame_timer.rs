use std::time::{Duration, Instant};

/// Wall-clock pacing for the redraw loop.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    delta_time: Duration,
}

impl Default for FrameTimer {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            delta_time: Duration::ZERO,
        }
    }
}

/// Minimum time between two frames at `frame_limit` frames per second; no limit when it is not
/// positive.
pub fn frame_interval(frame_limit: f32) -> Duration {
    if frame_limit > 0.0 && frame_limit.is_finite() {
        Duration::from_secs_f32(1.0 / frame_limit)
    } else {
        Duration::ZERO
    }
}

impl FrameTimer {
    /// Call when a frame starts.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_tick);
        self.last_tick = now;
    }

    #[inline]
    pub fn elapsed_since_tick(&self) -> Duration {
        self.last_tick.elapsed()
    }

    #[inline]
    pub fn delta_time_s(&self) -> f32 {
        self.delta_time.as_secs_f32()
    }

    #[inline]
    pub fn total_time_s(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    pub fn time_to_render(&self, frame_limit: f32) -> bool {
        self.elapsed_since_tick() >= frame_interval(frame_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(0.0), Duration::ZERO);
        assert_eq!(frame_interval(-5.0), Duration::ZERO);
        assert_eq!(frame_interval(f32::INFINITY), Duration::ZERO);
        let interval = frame_interval(120.0);
        assert!(interval > Duration::from_millis(8) && interval < Duration::from_millis(9));
    }

    #[test]
    fn test_unlimited_always_renders() {
        let mut timer = FrameTimer::default();
        timer.tick();
        assert!(timer.time_to_render(0.0));
    }

    #[test]
    fn test_limit_holds_back_a_fresh_tick() {
        let mut timer = FrameTimer::default();
        timer.tick();
        // one frame per hour
        assert!(!timer.time_to_render(1.0 / 3600.0));
    }
}
