//! Panel parameters: flow termination and driver loop control.
//!
//! [`PanelParams`] groups the static parameters of a panel run: the step
//! budget and commit threshold used by the flow state machine, plus the
//! stagnation settings and RNG seed used by the driver. These are supplied
//! by the caller; nothing here is process-wide state.

use panel_domain::{
    DEFAULT_COMMIT_THRESHOLD, DEFAULT_MAX_STEPS, DomainError, TerminationPolicy,
    clamp_step_budget,
};
use serde::{Deserialize, Serialize};

/// Default number of consecutive flat steps that counts as stagnation
pub const DEFAULT_STAGNATION_WINDOW: u32 = 5;

/// Default certainty delta below which a step counts as flat
pub const DEFAULT_STAGNATION_EPSILON: f64 = 1e-3;

/// Panel run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelParams {
    /// Step budget (`MAX_STEPS`)
    pub max_steps: u32,
    /// Certainty a COMMIT needs to finalize the flow
    pub commit_threshold: f64,
    /// Consecutive flat steps before the driver stops
    pub stagnation_window: u32,
    /// Certainty delta treated as "no change"
    pub stagnation_epsilon: f64,
    /// Seed for exploration randomness; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for PanelParams {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            commit_threshold: DEFAULT_COMMIT_THRESHOLD,
            stagnation_window: DEFAULT_STAGNATION_WINDOW,
            stagnation_epsilon: DEFAULT_STAGNATION_EPSILON,
            seed: None,
        }
    }
}

impl PanelParams {
    // ==================== Builder Methods ====================

    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_commit_threshold(mut self, threshold: f64) -> Self {
        self.commit_threshold = threshold;
        self
    }

    pub fn with_stagnation(mut self, window: u32, epsilon: f64) -> Self {
        self.stagnation_window = window;
        self.stagnation_epsilon = epsilon;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Step budget as used by the driver: clamped into `[1, 30]`.
    pub fn step_budget(&self) -> u32 {
        clamp_step_budget(self.max_steps)
    }

    /// Validated termination policy for the flow state machine.
    pub fn termination_policy(&self) -> Result<TerminationPolicy, DomainError> {
        TerminationPolicy::new(self.max_steps, self.commit_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = PanelParams::default();
        assert_eq!(params.max_steps, 20);
        assert_eq!(params.commit_threshold, 0.8);
        assert_eq!(params.stagnation_window, 5);
        assert_eq!(params.stagnation_epsilon, 0.001);
        assert!(params.seed.is_none());
    }

    #[test]
    fn test_builder() {
        let params = PanelParams::default()
            .with_max_steps(50)
            .with_commit_threshold(0.9)
            .with_seed(Some(7));

        assert_eq!(params.max_steps, 50);
        assert_eq!(params.step_budget(), 30);
        assert_eq!(params.seed, Some(7));
        assert_eq!(params.termination_policy().unwrap().commit_threshold(), 0.9);
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let params = PanelParams::default().with_commit_threshold(-0.1);
        assert!(params.termination_policy().is_err());
    }
}
