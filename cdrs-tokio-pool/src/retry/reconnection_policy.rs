use derive_more::Constructor;
#[cfg(test)]
use mockall::automock;
use rand::{rng, Rng};
use std::time::Duration;

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);

/// Determines how many times establishing a connection is attempted, and how long to wait between
/// attempts.
#[cfg_attr(test, automock)]
pub trait ReconnectionPolicy {
    /// Maximum number of connection attempts. At least one attempt is always made.
    fn max_retries(&self) -> usize;

    /// Delay after the failed attempt with given (zero-based) index.
    fn interval(&self, attempt: usize) -> Duration;
}

/// Retries at constant interval.
#[derive(Copy, Clone, Constructor, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct ConstantReconnectionPolicy {
    max_retries: usize,
    interval: Duration,
}

impl Default for ConstantReconnectionPolicy {
    fn default() -> Self {
        ConstantReconnectionPolicy::new(DEFAULT_MAX_RETRIES, DEFAULT_INTERVAL)
    }
}

impl ReconnectionPolicy for ConstantReconnectionPolicy {
    fn max_retries(&self) -> usize {
        self.max_retries
    }

    fn interval(&self, _attempt: usize) -> Duration {
        self.interval
    }
}

/// Makes a single attempt and never retries.
#[derive(Default, Copy, Clone, Debug, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct NeverReconnectionPolicy;

impl ReconnectionPolicy for NeverReconnectionPolicy {
    fn max_retries(&self) -> usize {
        1
    }

    fn interval(&self, _attempt: usize) -> Duration {
        Duration::ZERO
    }
}

/// A reconnection policy that waits exponentially longer between each attempt (but keeps a
/// constant delay once a maximum interval is reached). The delay will increase exponentially,
/// with an added jitter.
#[derive(Copy, Clone, Constructor, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct ExponentialReconnectionPolicy {
    max_retries: usize,
    initial_interval: Duration,
    max_interval: Duration,
}

impl Default for ExponentialReconnectionPolicy {
    fn default() -> Self {
        ExponentialReconnectionPolicy::new(
            DEFAULT_MAX_RETRIES,
            DEFAULT_INTERVAL,
            DEFAULT_MAX_INTERVAL,
        )
    }
}

impl ReconnectionPolicy for ExponentialReconnectionPolicy {
    fn max_retries(&self) -> usize {
        self.max_retries
    }

    fn interval(&self, attempt: usize) -> Duration {
        let delay = self
            .initial_interval
            .saturating_mul(
                1u32.checked_shl(attempt.min(u32::MAX as usize) as u32)
                    .unwrap_or(u32::MAX),
            )
            .min(self.max_interval);

        let jitter = rng().random_range(85..116);

        (delay / 100)
            .saturating_mul(jitter)
            .clamp(self.initial_interval, self.max_interval.max(self.initial_interval))
    }
}
