//! Delay schedule between retry attempts.
//!
//! The window doubles from `base` with every failed attempt and stops growing
//! at `max`. The actual wait is drawn from the upper half of the window, so
//! the reconciler and a restarting engine do not retry in lockstep and no
//! wait ever exceeds `max`.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms.max(base_ms)),
        }
    }

    /// Longest wait after `failures` failed attempts.
    pub fn ceiling(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Wait before the next attempt, somewhere in `[ceiling / 2, ceiling]`.
    pub fn delay(&self, failures: u32) -> Duration {
        let ceiling = self.ceiling(failures).as_millis() as u64;
        let floor = ceiling / 2;
        if floor == ceiling {
            return Duration::from_millis(ceiling);
        }
        Duration::from_millis(rand::thread_rng().gen_range(floor..=ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_doubles_then_caps() {
        let backoff = Backoff::new(100, 1000);
        assert_eq!(backoff.ceiling(0), Duration::ZERO);
        assert_eq!(backoff.ceiling(1), Duration::from_millis(100));
        assert_eq!(backoff.ceiling(3), Duration::from_millis(400));
        assert_eq!(backoff.ceiling(5), Duration::from_millis(1000));
        assert_eq!(backoff.ceiling(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_stays_in_upper_half() {
        let backoff = Backoff::new(100, 1000);
        for failures in 1..8 {
            let ceiling = backoff.ceiling(failures);
            let delay = backoff.delay(failures);
            assert!(delay >= ceiling / 2 && delay <= ceiling, "{failures}: {delay:?}");
        }
        assert_eq!(backoff.delay(0), Duration::ZERO);
    }

    #[test]
    fn test_max_below_base_is_raised() {
        assert_eq!(Backoff::new(50, 10).ceiling(3), Duration::from_millis(50));
    }
}
