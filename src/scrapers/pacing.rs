//! Request pacing: fixed pauses, timeouts, and randomized inter-page jitter.

use std::time::Duration;

use rand::Rng;

/// Uniformly random delay between page turns, making the request pattern
/// less regular.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterPolicy {
    min: Duration,
    max: Duration,
}

impl JitterPolicy {
    /// Bounds are reordered if given backwards.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for JitterPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }
}

/// Everything time-related the pagination controller needs.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub warmup: Duration,
    pub scroll_settle: Duration,
    pub capture_timeout: Duration,
    pub control_timeout: Duration,
    pub render_timeout: Duration,
    pub jitter: JitterPolicy,
    pub pagination_retries: u32,
}

impl Pacing {
    /// Zero pauses and short timeouts, for scripted sessions.
    pub fn immediate() -> Self {
        Self {
            warmup: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            capture_timeout: Duration::from_millis(50),
            control_timeout: Duration::from_millis(50),
            render_timeout: Duration::from_millis(50),
            jitter: JitterPolicy::none(),
            pagination_retries: 0,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        crate::config::PacingConfig::default().pacing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_within_bounds() {
        let policy = JitterPolicy::new(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..200 {
            let d = policy.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_none_is_zero() {
        assert_eq!(JitterPolicy::none().sample(), Duration::ZERO);
    }

    #[test]
    fn test_reversed_bounds_are_reordered() {
        let policy = JitterPolicy::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(policy.bounds(), (Duration::from_secs(1), Duration::from_secs(3)));
    }

    #[test]
    fn test_default_pacing_matches_config_defaults() {
        let pacing = Pacing::default();
        assert_eq!(pacing.warmup, Duration::from_secs(15));
        assert_eq!(pacing.jitter, JitterPolicy::default());
        assert_eq!(pacing.pagination_retries, 0);
    }
}
