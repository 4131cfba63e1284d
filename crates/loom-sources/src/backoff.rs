//! Exponential backoff for source adapters (§4.11): polling and stream
//! adapters back off their retry cadence on failure and reset it on
//! success. Distinct from `loom_ingest::backoff_delay`, which governs
//! ingestion entry redelivery rather than adapter reconnects.

use std::time::Duration;

/// Doubles `current` up to `cap`, with no jitter: adapters reconnect on a
/// visible, debuggable cadence rather than a jittered one.
pub fn step(current: Duration, cap: Duration) -> Duration {
    let doubled = current.saturating_mul(2);
    if doubled > cap {
        cap
    } else {
        doubled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_doubles_until_capped() {
        let cap = Duration::from_secs(60);
        let mut delay = Duration::from_secs(5);
        delay = step(delay, cap);
        assert_eq!(delay, Duration::from_secs(10));
        delay = step(delay, cap);
        assert_eq!(delay, Duration::from_secs(20));
        delay = step(Duration::from_secs(50), cap);
        assert_eq!(delay, cap);
    }
}
