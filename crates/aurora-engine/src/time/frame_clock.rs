use std::time::Instant;

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTime {
    /// Milliseconds since the clock was created. Never decreases.
    pub timestamp_ms: f64,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Animation clock standing in for a browser's animation-frame timestamp.
///
/// Timestamps are measured from a fixed origin so they keep growing across
/// stalls and suspensions.
#[derive(Debug, Clone)]
pub struct FrameClock {
    origin: Instant,
    last_timestamp_ms: f64,
    frame_index: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a clock whose timestamps count from `origin`.
    pub fn starting_at(origin: Instant) -> Self {
        Self {
            origin,
            last_timestamp_ms: 0.0,
            frame_index: 0,
        }
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock as if the frame started at `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let elapsed_ms = now.saturating_duration_since(self.origin).as_secs_f64() * 1000.0;
        self.last_timestamp_ms = self.last_timestamp_ms.max(elapsed_ms);

        let ft = FrameTime {
            timestamp_ms: self.last_timestamp_ms,
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timestamps_are_measured_from_origin() {
        let origin = Instant::now();
        let mut clock = FrameClock::starting_at(origin);

        let ft = clock.tick_at(origin + Duration::from_millis(40));
        assert!((ft.timestamp_ms - 40.0).abs() < 1e-6);
        assert_eq!(ft.frame_index, 0);

        let ft = clock.tick_at(origin + Duration::from_millis(56));
        assert!((ft.timestamp_ms - 56.0).abs() < 1e-6);
        assert_eq!(ft.frame_index, 1);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let origin = Instant::now();
        let mut clock = FrameClock::starting_at(origin);

        let later = clock.tick_at(origin + Duration::from_millis(100));
        let earlier = clock.tick_at(origin + Duration::from_millis(30));
        assert!(earlier.timestamp_ms >= later.timestamp_ms);
    }

    #[test]
    fn long_stall_is_reported_in_full() {
        let origin = Instant::now();
        let mut clock = FrameClock::starting_at(origin);

        let ft = clock.tick_at(origin + Duration::from_secs(5));
        assert!((ft.timestamp_ms - 5000.0).abs() < 1e-6);
    }
}
