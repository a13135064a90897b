//! Termination policy for a flow

use crate::core::error::DomainError;
use crate::panel::resolve::FinalConsensus;
use serde::{Deserialize, Serialize};

/// Default step budget
pub const DEFAULT_MAX_STEPS: u32 = 20;

/// Upper bound a driver may request for the step budget
pub const MAX_STEP_BUDGET: u32 = 30;

/// Default certainty required to finalize a COMMIT
pub const DEFAULT_COMMIT_THRESHOLD: f64 = 0.8;

/// When a flow is done: a confident COMMIT, or the step budget is reached
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminationPolicy {
    max_steps: u32,
    commit_threshold: f64,
}

impl TerminationPolicy {
    pub fn new(max_steps: u32, commit_threshold: f64) -> Result<Self, DomainError> {
        if max_steps == 0 {
            return Err(DomainError::InvalidStepBudget);
        }
        if !(0.0..=1.0).contains(&commit_threshold) {
            return Err(DomainError::InvalidThreshold(commit_threshold));
        }
        Ok(Self {
            max_steps,
            commit_threshold,
        })
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn commit_threshold(&self) -> f64 {
        self.commit_threshold
    }

    /// Whether this consensus finalizes the flow (report + status `ok`)
    pub fn is_final_commit(&self, consensus: &FinalConsensus) -> bool {
        consensus.commits_at(self.commit_threshold)
    }

    /// Whether the flow stops after `step_index`
    pub fn is_done(&self, consensus: &FinalConsensus, step_index: u32) -> bool {
        self.is_final_commit(consensus) || step_index + 1 >= self.max_steps
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            commit_threshold: DEFAULT_COMMIT_THRESHOLD,
        }
    }
}

/// Clamp a requested step budget into `[1, MAX_STEP_BUDGET]`.
pub fn clamp_step_budget(requested: u32) -> u32 {
    requested.clamp(1, MAX_STEP_BUDGET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::action::PanelAction;

    fn consensus(action: PanelAction, certainty: f64) -> FinalConsensus {
        FinalConsensus {
            action,
            rationale: "r".to_string(),
            questions: None,
            orders: None,
            diagnosis: action.is_commit().then(|| "CAP".to_string()),
            certainty,
        }
    }

    #[test]
    fn test_confident_commit_is_done() {
        let policy = TerminationPolicy::default();
        assert!(policy.is_done(&consensus(PanelAction::Commit, 0.85), 5));
        assert!(policy.is_done(&consensus(PanelAction::Commit, 0.8), 5));
        assert!(!policy.is_done(&consensus(PanelAction::Commit, 0.79), 5));
    }

    #[test]
    fn test_high_certainty_ask_is_not_final() {
        let policy = TerminationPolicy::default();
        assert!(!policy.is_final_commit(&consensus(PanelAction::Ask, 0.99)));
    }

    #[test]
    fn test_step_budget_ends_the_flow() {
        let policy = TerminationPolicy::new(4, 0.8).unwrap();
        let ask = consensus(PanelAction::Ask, 0.2);
        assert!(!policy.is_done(&ask, 2));
        assert!(policy.is_done(&ask, 3));
    }

    #[test]
    fn test_single_step_budget() {
        let policy = TerminationPolicy::new(1, 0.8).unwrap();
        assert!(policy.is_done(&consensus(PanelAction::Order, 0.1), 1));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert_eq!(
            TerminationPolicy::new(0, 0.8),
            Err(DomainError::InvalidStepBudget)
        );
        assert_eq!(
            TerminationPolicy::new(5, 1.2),
            Err(DomainError::InvalidThreshold(1.2))
        );
        assert!(TerminationPolicy::new(5, f64::NAN).is_err());
    }

    #[test]
    fn test_clamp_step_budget() {
        assert_eq!(clamp_step_budget(0), 1);
        assert_eq!(clamp_step_budget(20), 20);
        assert_eq!(clamp_step_budget(31), MAX_STEP_BUDGET);
    }
}
