//! Handshake timing.

use std::time::Duration;

use tracing::warn;

/// Timing for the `ClientHello` retry loop.
///
/// The first hello goes out `first_attempt` after the handshake starts.
/// Each later attempt waits twice as long as the previous one, starting at
/// `initial_interval` and never exceeding `max_interval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Delay before the first hello. Default: 500 ms.
    pub first_attempt: Duration,
    /// Wait after the first hello. Default: 1000 ms.
    pub initial_interval: Duration,
    /// Upper bound for the backoff. Default: 60 s.
    pub max_interval: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            first_attempt: Duration::from_millis(500),
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(60_000),
        }
    }
}

impl HandshakeConfig {
    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Connection::new`](crate::Connection::new).
    /// Rules:
    /// - `initial_interval` is at least 1 ms (a zero interval would never
    ///   back off).
    /// - `max_interval` is at least `initial_interval`.
    pub fn validated(mut self) -> Self {
        if self.initial_interval.is_zero() {
            warn!("initial_interval is zero, using 1 ms");
            self.initial_interval = Duration::from_millis(1);
        }
        if self.max_interval < self.initial_interval {
            warn!(
                max_ms = self.max_interval.as_millis() as u64,
                initial_ms = self.initial_interval.as_millis() as u64,
                "max_interval below initial_interval, raising it"
            );
            self.max_interval = self.initial_interval;
        }
        self
    }

    /// The interval that follows `current`, or the initial one if no hello
    /// has been sent in this cycle yet.
    pub fn next_interval(&self, current: Option<Duration>) -> Duration {
        match current {
            None => self.initial_interval,
            Some(interval) => interval.saturating_mul(2).min(self.max_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_default_matches_coordinator_timings() {
        let cfg = HandshakeConfig::default();
        assert_eq!(cfg.first_attempt, ms(500));
        assert_eq!(cfg.initial_interval, ms(1000));
        assert_eq!(cfg.max_interval, ms(60_000));
    }

    #[test]
    fn test_next_interval_doubles_and_caps() {
        let cfg = HandshakeConfig::default();
        assert_eq!(cfg.next_interval(None), ms(1000));
        assert_eq!(cfg.next_interval(Some(ms(1000))), ms(2000));
        assert_eq!(cfg.next_interval(Some(ms(32_000))), ms(60_000));
        assert_eq!(cfg.next_interval(Some(ms(60_000))), ms(60_000));
    }

    #[test]
    fn test_validated_zero_interval_becomes_one_ms() {
        let cfg = HandshakeConfig {
            initial_interval: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.initial_interval, ms(1));
    }

    #[test]
    fn test_validated_max_below_initial_is_raised() {
        let cfg = HandshakeConfig {
            initial_interval: ms(5000),
            max_interval: ms(100),
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.max_interval, ms(5000));
    }
}
