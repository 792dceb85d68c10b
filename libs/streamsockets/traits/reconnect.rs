use std::time::Duration;

/// Decides whether and when a dropped connection is re-established
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before reconnection attempt `attempt` (0-indexed), or `None` to stop
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Same delay before every attempt
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// `max_attempts = None` retries forever
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_unlimited() {
        let strategy = FixedDelay::new(Duration::from_secs(1), None);
        for attempt in [0, 1, 10, 10_000] {
            assert_eq!(strategy.next_delay(attempt), Some(Duration::from_secs(1)));
        }
    }

    #[test]
    fn test_fixed_delay_with_max_attempts() {
        let strategy = FixedDelay::new(Duration::from_millis(500), Some(2));
        assert!(strategy.next_delay(0).is_some());
        assert!(strategy.next_delay(1).is_some());
        assert!(strategy.next_delay(2).is_none());
    }
}
