// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff for outbound sends.

use std::time::Duration;

use nexus_config::model::BridgeConfig;
use nexus_core::NexusError;

/// Attempt budget and delay curve for [`crate::BridgeManager::send_message_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling from the base
    /// and capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1_u32 << shift);
        delay.min(self.max_delay)
    }

    /// Whether another attempt should follow `error` after `attempts_made`.
    pub fn should_retry(&self, error: &NexusError, attempts_made: u32) -> bool {
        error.is_retryable() && attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for RetryPolicy {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            max_attempts: config.send_max_attempts.max(1),
            base_delay: Duration::from_millis(config.send_base_delay_ms),
            max_delay: Duration::from_secs(config.send_max_delay_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::Platform;

    #[test]
    fn defaults_match_bridge_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn only_retryable_errors_within_budget_retry() {
        let policy = RetryPolicy::default();
        let transient = NexusError::transient("502 from upstream");
        assert!(policy.should_retry(&transient, 1));
        assert!(policy.should_retry(&transient, 2));
        assert!(!policy.should_retry(&transient, 3));

        let auth = NexusError::auth(Platform::WhatsApp, "token expired");
        assert!(!policy.should_retry(&auth, 1));
        assert!(!policy.should_retry(&NexusError::permanent("bad recipient"), 1));
    }

    #[test]
    fn zero_attempts_config_still_sends_once() {
        let config = BridgeConfig {
            send_max_attempts: 0,
            ..BridgeConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }
}
