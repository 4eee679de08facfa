//! Minimum-interval gate for rate-limited services.

use std::time::Duration;

use tokio::time::Instant;

/// Enforces a minimum delay between consecutive calls.
///
/// The geocoding service's rate policy is a hard external constraint, not
/// a tunable. Any future concurrent caller must funnel through a single
/// shared gate rather than keep a per-worker timer.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Sleep until at least `min_interval` has passed since the previous
    /// gated call, then stamp the current one.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.min_interval).await;
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let mut gate = RateGate::new(Duration::from_secs(1));

        gate.wait().await;
        let first = Instant::now();
        gate.wait().await;
        let second = Instant::now();
        gate.wait().await;
        let third = Instant::now();

        assert!(second - first >= Duration::from_secs(1));
        assert!(third - second >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_not_delayed() {
        let mut gate = RateGate::new(Duration::from_secs(1));

        let before = Instant::now();
        gate.wait().await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_counts_toward_the_interval() {
        let mut gate = RateGate::new(Duration::from_secs(1));

        gate.wait().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let before = Instant::now();
        gate.wait().await;
        // The interval already passed while we were doing other work.
        assert_eq!(Instant::now(), before);
    }
}
