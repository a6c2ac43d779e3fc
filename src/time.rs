use std::time::{Duration, Instant};

/// Seconds since the render loop started, the only time source animations see.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn seconds(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = Clock::start();
        let first = clock.seconds();
        let second = clock.seconds();
        assert!(first >= 0.0);
        assert!(second >= first);
    }
}
