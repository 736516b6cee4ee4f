//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Capped exponential backoff with additive jitter.
///
/// `delay(attempt) = min(base * 2^attempt, max) + random(0..jitter)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl BackoffPolicy {
    pub fn new(base_ms: u64, max_ms: u64, jitter_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms),
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base.as_millis() as u64,
            self.max.as_millis() as u64,
            self.jitter.as_millis() as u64,
        )
    }

    /// The deterministic part of [`delay`](Self::delay).
    pub fn capped(&self, attempt: u32) -> Duration {
        Duration::from_millis(capped_ms(
            attempt,
            self.base.as_millis() as u64,
            self.max.as_millis() as u64,
        ))
    }
}

fn capped_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    let exponential_base = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    base_ms.saturating_mul(exponential_base).min(max_ms)
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter_ms: u64) -> Duration {
    let capped_delay = capped_ms(attempt, base_ms, max_ms);

    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..jitter_ms)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Random pause in `[min_ms, max_ms]` used to space out upstream requests.
pub fn pacing_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(fastrand::u64(min_ms..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b0 = calculate_backoff(0, 1500, 8000, 250);
        assert!(b0.as_millis() >= 1500 && b0.as_millis() < 1750);

        let b1 = calculate_backoff(1, 1500, 8000, 250);
        assert!(b1.as_millis() >= 3000 && b1.as_millis() < 3250);

        let max = calculate_backoff(10, 1500, 8000, 250);
        assert!(max.as_millis() >= 8000 && max.as_millis() < 8250);
    }

    #[test]
    fn test_capped_sequence() {
        let policy = BackoffPolicy::new(1500, 8000, 250);
        let delays: Vec<u64> = (0..5).map(|a| policy.capped(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1500, 3000, 6000, 8000, 8000]);
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = BackoffPolicy::new(1500, 8000, 0);
        assert_eq!(policy.delay(200), Duration::from_millis(8000));
    }

    #[test]
    fn test_pacing_bounds() {
        for _ in 0..100 {
            let d = pacing_delay(60, 120).as_millis();
            assert!((60..=120).contains(&d));
        }
        assert_eq!(pacing_delay(50, 50), Duration::from_millis(50));
    }
}
