use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Gates how often incoming frames are accepted downstream (~3 fps default).
///
/// Rejected frames are discarded with no side effects; this is a deliberate
/// drop policy, not a queue. Safe for concurrent use from the stream task and
/// test drivers; accepted baselines only ever move forward.
#[derive(Debug)]
pub struct FrameRateLimiter {
    min_interval: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl FrameRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: Mutex::new(None),
        }
    }

    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    /// Accept `at` as the new baseline iff at least the minimum interval has
    /// elapsed since the last accepted timestamp (the very first frame is
    /// always accepted).
    pub fn accept(&self, at: Instant) -> bool {
        let mut last = self.last_accepted.lock();
        match *last {
            Some(baseline) if at.duration_since(baseline) < self.min_interval => false,
            _ => {
                *last = Some(at);
                true
            }
        }
    }

    /// Forget the baseline so the next frame is accepted unconditionally.
    pub fn reset(&self) {
        *self.last_accepted.lock() = None;
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_always_accepted() {
        let limiter = FrameRateLimiter::from_millis(333);
        assert!(limiter.accept(Instant::now()));
    }

    #[test]
    fn frames_inside_window_rejected() {
        let limiter = FrameRateLimiter::from_millis(333);
        let start = Instant::now();

        assert!(limiter.accept(start));
        assert!(!limiter.accept(start + Duration::from_millis(50)));
        assert!(!limiter.accept(start + Duration::from_millis(300)));
        assert!(limiter.accept(start + Duration::from_millis(333)));
    }

    #[test]
    fn spaced_frames_all_accepted() {
        let limiter = FrameRateLimiter::from_millis(333);
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.accept(start + Duration::from_millis(333 * i)));
        }
    }

    #[test]
    fn one_accept_per_window() {
        // 10 frames 50ms apart against a 333ms window: t=0 and t=350 pass.
        let limiter = FrameRateLimiter::from_millis(333);
        let start = Instant::now();

        let accepted: usize = (0..10)
            .filter(|i| limiter.accept(start + Duration::from_millis(50 * i)))
            .count();
        assert_eq!(accepted, 2);
    }

    #[test]
    fn rejected_frames_do_not_move_baseline() {
        let limiter = FrameRateLimiter::from_millis(100);
        let start = Instant::now();

        assert!(limiter.accept(start));
        assert!(!limiter.accept(start + Duration::from_millis(60)));
        // Rejection at t=60 must not push the window; t=100 still clears it.
        assert!(limiter.accept(start + Duration::from_millis(100)));
    }

    #[test]
    fn reset_reopens_the_gate() {
        let limiter = FrameRateLimiter::from_millis(1_000);
        let start = Instant::now();

        assert!(limiter.accept(start));
        assert!(!limiter.accept(start + Duration::from_millis(1)));
        limiter.reset();
        assert!(limiter.accept(start + Duration::from_millis(2)));
    }
}
