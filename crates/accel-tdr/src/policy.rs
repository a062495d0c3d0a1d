//! Recovery suppression policy.
//!
//! A stuck verdict can persist across many scan cycles while the device layer
//! is still working through a slow reset. [`RecoveryPolicy`] decides whether
//! each of those verdicts actually calls the recovery handler.

use serde::{Deserialize, Serialize};

/// How repeated stuck verdicts are turned into recovery calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RecoveryPolicy {
    /// Recover on every cycle that ends in a stuck verdict.
    #[default]
    EveryCycle,
    /// After a recovery, skip the next `cycles` consecutive stuck verdicts.
    Cooldown {
        /// Number of stuck verdicts to suppress after each recovery.
        cycles: u32,
    },
}

/// Per-evaluator bookkeeping for [`RecoveryPolicy`].
#[derive(Debug, Default)]
pub(crate) struct PolicyState {
    cooldown_remaining: u32,
}

impl PolicyState {
    /// Called on a stuck verdict. Returns `true` when recovery should run.
    pub(crate) fn on_stuck(&mut self, policy: RecoveryPolicy) -> bool {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return false;
        }
        if let RecoveryPolicy::Cooldown { cycles } = policy {
            self.cooldown_remaining = cycles;
        }
        true
    }

    /// Called on any verdict other than stuck.
    pub(crate) fn on_clear(&mut self) {
        self.cooldown_remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_cycle_always_recovers() {
        let mut state = PolicyState::default();
        for _ in 0..5 {
            assert!(state.on_stuck(RecoveryPolicy::EveryCycle));
        }
    }

    #[test]
    fn test_cooldown_suppresses_following_cycles() {
        let policy = RecoveryPolicy::Cooldown { cycles: 2 };
        let mut state = PolicyState::default();

        assert!(state.on_stuck(policy));
        assert!(!state.on_stuck(policy));
        assert!(!state.on_stuck(policy));
        assert!(state.on_stuck(policy));
    }

    #[test]
    fn test_clear_resets_cooldown() {
        let policy = RecoveryPolicy::Cooldown { cycles: 10 };
        let mut state = PolicyState::default();

        assert!(state.on_stuck(policy));
        state.on_clear();
        assert!(state.on_stuck(policy));
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&RecoveryPolicy::Cooldown { cycles: 3 });
        assert_eq!(
            json.ok().as_deref(),
            Some(r#"{"kind":"cooldown","cycles":3}"#)
        );
    }
}
