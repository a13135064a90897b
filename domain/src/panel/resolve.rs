//! Consensus resolution
//!
//! Applies the stewardship veto to proposed orders and guarantees a
//! non-empty rationale. The result carries exactly one action payload.

use super::action::PanelAction;
use super::output::{ConsensusDecision, PanelOutput};
use super::schema::FALLBACK_RATIONALE;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const REASON_DIFFERENTIAL: &str = "based on current leading differentials";
const REASON_TESTS: &str = "tests were chosen to clarify diagnostic uncertainty";
const REASON_VETO: &str = "low-yield or costly tests were excluded";
const REASON_COMMIT: &str = "the panel reached consensus with sufficient certainty for diagnosis";

/// The finalized decision for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalConsensus {
    pub action: PanelAction,
    pub rationale: String,
    pub questions: Option<Vec<String>>,
    /// Orders after the stewardship veto
    pub orders: Option<Vec<String>>,
    pub diagnosis: Option<String>,
    pub certainty: f64,
}

impl FinalConsensus {
    /// Whether this consensus finalizes the flow under `threshold`
    pub fn commits_at(&self, threshold: f64) -> bool {
        self.action.is_commit() && self.certainty >= threshold
    }

    /// Non-empty final orders, if any
    pub fn final_orders(&self) -> &[String] {
        self.orders.as_deref().unwrap_or(&[])
    }
}

/// Resolve a validated panel output into its final consensus.
pub fn resolve(output: &PanelOutput) -> FinalConsensus {
    let consensus = &output.consensus;
    let vetoed = &output.personas.stewardship.vetoed_tests;

    let (questions, orders, diagnosis) = match &consensus.decision {
        ConsensusDecision::Ask { questions } => (Some(questions.clone()), None, None),
        ConsensusDecision::Order { orders } => (None, Some(apply_veto(orders, vetoed)), None),
        ConsensusDecision::Commit { diagnosis } => (None, None, Some(diagnosis.clone())),
    };

    let rationale = match consensus.rationale.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => synthesize_rationale(output),
    };

    FinalConsensus {
        action: consensus.action(),
        rationale,
        questions,
        orders,
        diagnosis,
        certainty: consensus.certainty,
    }
}

/// `orders` minus `vetoed` by exact string match, keeping order.
pub fn apply_veto(orders: &[String], vetoed: &[String]) -> Vec<String> {
    let vetoed: HashSet<&str> = vetoed.iter().map(String::as_str).collect();
    orders
        .iter()
        .filter(|order| !vetoed.contains(order.as_str()))
        .cloned()
        .collect()
}

fn synthesize_rationale(output: &PanelOutput) -> String {
    let personas = &output.personas;
    let mut reasons = Vec::new();

    if !personas.hypothesis.top3.is_empty() {
        reasons.push(REASON_DIFFERENTIAL);
    }
    if !personas.test_chooser.tests.is_empty() {
        reasons.push(REASON_TESTS);
    }
    if !personas.stewardship.vetoed_tests.is_empty() {
        reasons.push(REASON_VETO);
    }
    if output.action().is_commit() {
        reasons.push(REASON_COMMIT);
    }

    if reasons.is_empty() {
        FALLBACK_RATIONALE.to_string()
    } else {
        format!("This decision was made {}.", reasons.join(", "))
    }
}
