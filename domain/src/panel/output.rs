//! Validated panel output types
//!
//! [`PanelOutput`] is the statically typed shape of one panel turn: five
//! persona sections plus the consensus. The consensus payload is a tagged
//! variant per action, so a value of this type can never carry questions on
//! a COMMIT or a diagnosis on an ASK.
//!
//! The serialized form is the flat JSON object the oracle is asked to emit:
//!
//! ```json
//! {
//!   "personas": { "hypothesis": { "top3": [] }, "stewardship": { "vetoed_tests": [] } },
//!   "consensus": { "action": "ORDER", "orders": ["CXR"], "certainty": 0.6 }
//! }
//! ```

use super::action::PanelAction;
use serde::{Deserialize, Serialize};

/// One entry of the ranked differential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialEntry {
    pub dx: String,
    /// Probability in [0, 1]
    pub probability: f64,
    #[serde(default)]
    pub key_features: Vec<String>,
}

/// Dr. Hypothesis: probability-ranked differential (at most three entries)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HypothesisSection {
    pub top3: Vec<DifferentialEntry>,
}

/// Dr. Test-Chooser: discriminating tests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestChooserSection {
    pub tests: Vec<String>,
}

/// Dr. Challenger: devil's advocate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengerSection {
    pub anchoring_risks: Vec<String>,
    pub contradictions: Vec<String>,
    pub falsification_tests: Vec<String>,
}

/// Dr. Stewardship: cost control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StewardshipSection {
    pub vetoed_tests: Vec<String>,
    pub cheaper_alternatives: Vec<String>,
}

/// Dr. Checklist: silent quality control
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_ok: Option<bool>,
    pub safety_flags: Vec<String>,
}

/// All five persona sections; an absent section is an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSections {
    pub hypothesis: HypothesisSection,
    pub test_chooser: TestChooserSection,
    pub challenger: ChallengerSection,
    pub stewardship: StewardshipSection,
    pub checklist: ChecklistSection,
}

/// Action-dependent consensus payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum ConsensusDecision {
    Ask { questions: Vec<String> },
    Order { orders: Vec<String> },
    Commit { diagnosis: String },
}

impl ConsensusDecision {
    pub fn action(&self) -> PanelAction {
        match self {
            ConsensusDecision::Ask { .. } => PanelAction::Ask,
            ConsensusDecision::Order { .. } => PanelAction::Order,
            ConsensusDecision::Commit { .. } => PanelAction::Commit,
        }
    }
}

/// The panel's agreed decision for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConsensus {
    #[serde(flatten)]
    pub decision: ConsensusDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Collective certainty in [0, 1]
    pub certainty: f64,
}

impl PanelConsensus {
    pub fn action(&self) -> PanelAction {
        self.decision.action()
    }

    /// Orders proposed by the consensus (before stewardship veto)
    pub fn proposed_orders(&self) -> &[String] {
        match &self.decision {
            ConsensusDecision::Order { orders } => orders,
            _ => &[],
        }
    }
}

/// A normalized, schema-checked panel turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelOutput {
    pub personas: PersonaSections,
    pub consensus: PanelConsensus,
}

impl PanelOutput {
    pub fn action(&self) -> PanelAction {
        self.consensus.action()
    }
}
