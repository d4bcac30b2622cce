//! Harness configuration with environment overrides.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `STAGECHECK_SETTLE_MS` | Fixed settle delay after mutating steps (ms) | `100` |
//! | `STAGECHECK_ACTION_TIMEOUT_MS` | Per-action timeout (ms), unset for none | unset |
//! | `STAGECHECK_STRICT` | `1`/`true` to fail `count` steps that match nothing | `false` |

use crate::action::ActionOutcome;
use crate::settle::DEFAULT_SETTLE_DELAY;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const ENV_SETTLE_MS: &str = "STAGECHECK_SETTLE_MS";
pub const ENV_ACTION_TIMEOUT_MS: &str = "STAGECHECK_ACTION_TIMEOUT_MS";
pub const ENV_STRICT: &str = "STAGECHECK_STRICT";

/// How an action's return value decides whether its step passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassRule {
    /// Only an explicit `false` fails; counts of zero pass.
    #[default]
    Lenient,
    /// Like lenient, but a count of zero also fails.
    Strict,
}

impl PassRule {
    pub fn accepts(self, outcome: ActionOutcome) -> bool {
        match outcome {
            ActionOutcome::Bool(value) => value,
            ActionOutcome::Count(0) => self == PassRule::Lenient,
            ActionOutcome::Count(_) | ActionOutcome::Done => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub settle_delay: Duration,
    pub action_timeout: Option<Duration>,
    pub pass_rule: PassRule,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            action_timeout: None,
            pass_rule: PassRule::Lenient,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            settle_delay: env_millis(ENV_SETTLE_MS).unwrap_or(defaults.settle_delay),
            action_timeout: env_millis(ENV_ACTION_TIMEOUT_MS).or(defaults.action_timeout),
            pass_rule: match env::var(ENV_STRICT).ok().as_deref().map(str::trim) {
                Some("1") | Some("true") | Some("yes") => PassRule::Strict,
                _ => defaults.pass_rule,
            },
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn with_pass_rule(mut self, rule: PassRule) -> Self {
        self.pass_rule = rule;
        self
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_fixed_settle_and_lenient_rule() {
        let config = HarnessConfig::default();
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert_eq!(config.action_timeout, None);
        assert_eq!(config.pass_rule, PassRule::Lenient);
    }

    #[test]
    fn only_strict_rejects_empty_counts() {
        assert!(PassRule::Lenient.accepts(ActionOutcome::Count(0)));
        assert!(!PassRule::Strict.accepts(ActionOutcome::Count(0)));
        assert!(PassRule::Strict.accepts(ActionOutcome::Count(2)));
        assert!(PassRule::Strict.accepts(ActionOutcome::Done));
        assert!(!PassRule::Lenient.accepts(ActionOutcome::Bool(false)));
    }

    #[test]
    fn env_overrides_are_read() {
        env::set_var(ENV_SETTLE_MS, "5");
        env::set_var(ENV_ACTION_TIMEOUT_MS, "250");
        env::set_var(ENV_STRICT, "true");
        let config = HarnessConfig::from_env();
        env::remove_var(ENV_SETTLE_MS);
        env::remove_var(ENV_ACTION_TIMEOUT_MS);
        env::remove_var(ENV_STRICT);

        assert_eq!(config.settle_delay, Duration::from_millis(5));
        assert_eq!(config.action_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.pass_rule, PassRule::Strict);
    }
}
