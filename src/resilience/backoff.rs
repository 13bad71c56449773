//! Exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `base × 2^(attempt−1)`,
/// capped at `max_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    Duration::from_millis(delay_ms.min(max_ms))
}

/// [`calculate_backoff`] plus 0-10% jitter.
pub fn calculate_backoff_with_jitter(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let capped = calculate_backoff(attempt, base_ms, max_ms).as_millis() as u64;

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);
        assert_eq!(calculate_backoff(1, 100, 2000), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, 100, 2000), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, 100, 2000), Duration::from_millis(400));
        assert_eq!(calculate_backoff(10, 100, 1000), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(64, u64::MAX, u64::MAX), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        for _ in 0..50 {
            let d = calculate_backoff_with_jitter(2, 100, 2000).as_millis();
            assert!((200..220).contains(&d), "got {}", d);
        }
    }
}
