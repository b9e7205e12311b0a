/*!
 * Configuration
 * Timeout bounds for shutdown coordination and the per-connection
 * engine-deadline policy
 */

use crate::core::errors::CoordError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a protected call returns when the engine reports that its own
/// transaction deadline expired while the callback was running.
///
/// The deadline is engine-driven; the adapter never measures time itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutPolicy {
    /// Treat the expired attempt as committed
    Commit,
    /// Treat the expired attempt as rolled back (protected call returns false)
    Rollback,
    /// Surface a typed timeout error to the caller
    RaiseError,
}

impl TimeoutPolicy {
    /// Parse a policy from its wire code. Unknown codes are a configuration
    /// error, raised immediately and never retried.
    pub fn from_code(code: u32) -> Result<Self, CoordError> {
        match code {
            0 => Ok(TimeoutPolicy::RaiseError),
            1 => Ok(TimeoutPolicy::Commit),
            2 => Ok(TimeoutPolicy::Rollback),
            other => Err(CoordError::Config(format!(
                "unknown timeout policy code {}",
                other
            ))),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            TimeoutPolicy::RaiseError => 0,
            TimeoutPolicy::Commit => 1,
            TimeoutPolicy::Rollback => 2,
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy::RaiseError
    }
}

/// Coordination timeouts and signal-binding switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bound on waiting for all monitors to quiesce during shutdown.
    /// Expiry is advisory: logged, then shutdown proceeds anyway.
    pub monitor_shutdown_wait: Duration,
    /// Engine rundown bound when shutdown was triggered from a fatal-signal
    /// path. Kept short: the engine's internal lock is likely already held by
    /// the signal machinery and a long wait would only delay process exit.
    pub rundown_wait_short: Duration,
    /// Engine rundown bound for ordinary shutdown; allows time to flush state.
    pub rundown_wait_long: Duration,
    /// Bound on waiting, during init, for every monitor to confirm it has
    /// registered for delivery before init returns.
    pub signal_ack_wait: Duration,
    /// Forward real OS signal deliveries into the registry. Off by default so
    /// embedders that own process signal disposition can inject explicitly.
    pub bind_os_signals: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_shutdown_wait: Duration::from_secs(5),
            rundown_wait_short: Duration::from_millis(250),
            rundown_wait_long: Duration::from_secs(10),
            signal_ack_wait: Duration::from_secs(2),
            bind_os_signals: false,
        }
    }
}

impl Config {
    /// Validate bounds that would make shutdown degenerate.
    pub fn validate(&self) -> Result<(), CoordError> {
        if self.monitor_shutdown_wait.is_zero() {
            return Err(CoordError::Config(
                "monitor_shutdown_wait must be non-zero".to_string(),
            ));
        }
        if self.rundown_wait_short.is_zero() || self.rundown_wait_long.is_zero() {
            return Err(CoordError::Config(
                "rundown waits must be non-zero".to_string(),
            ));
        }
        if self.rundown_wait_short > self.rundown_wait_long {
            return Err(CoordError::Config(
                "rundown_wait_short must not exceed rundown_wait_long".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_codes_round_trip() {
        for policy in [
            TimeoutPolicy::RaiseError,
            TimeoutPolicy::Commit,
            TimeoutPolicy::Rollback,
        ] {
            assert_eq!(TimeoutPolicy::from_code(policy.code()).unwrap(), policy);
        }
    }

    #[test]
    fn unknown_policy_code_is_config_error() {
        assert!(matches!(
            TimeoutPolicy::from_code(99),
            Err(CoordError::Config(_))
        ));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn inverted_rundown_waits_rejected() {
        let config = Config {
            rundown_wait_short: Duration::from_secs(60),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
