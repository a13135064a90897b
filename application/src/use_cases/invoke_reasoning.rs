//! Reasoning invocation
//!
//! Wraps one oracle call: decides the sampling temperature and persona hint
//! from the turn history, composes the prompt and returns the raw text. The
//! output is not parsed here, and oracle errors are not recovered.

use crate::ports::reasoning_oracle::{OracleError, ReasoningOracle};
use panel_domain::panel::exploration;
use panel_domain::{CaseState, PanelPromptTemplate, SamplingDecision, Turn, is_repeating};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Invokes the reasoning oracle with adaptive sampling
pub struct ReasoningInvoker<O: ReasoningOracle + 'static> {
    oracle: Arc<O>,
    rng: Mutex<StdRng>,
}

impl<O: ReasoningOracle + 'static> ReasoningInvoker<O> {
    /// `seed` makes exploration reproducible; `None` seeds from entropy.
    pub fn new(oracle: Arc<O>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            oracle,
            rng: Mutex::new(rng),
        }
    }

    pub fn model_name(&self) -> &str {
        self.oracle.model_name()
    }

    /// Choose temperature and hint for the next call from the prior turns.
    pub fn plan(&self, turns: &[Turn]) -> SamplingDecision {
        let repeating = is_repeating(turns);
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let decision = exploration::select(repeating, &mut *rng);

        if let Some(hint) = decision.hint {
            info!(
                "Repetition detected, raising temperature to {:.2} ({})",
                decision.temperature, hint
            );
        }
        decision
    }

    /// Call the oracle and return its raw text unmodified.
    pub async fn invoke(
        &self,
        case: &CaseState,
        memory: &str,
        sampling: &SamplingDecision,
    ) -> Result<String, OracleError> {
        let system = PanelPromptTemplate::system(sampling.hint);
        let payload = PanelPromptTemplate::user_payload(case, memory);

        debug!(
            "Invoking oracle {} at temperature {:.2}",
            self.oracle.model_name(),
            sampling.temperature
        );
        self.oracle
            .generate(&system, &payload, sampling.temperature)
            .await
    }
}
