//! Reflective memory fed back into the oracle
//!
//! Each prior turn is rendered as a two-line digest entry; the digest is
//! wrapped in a directive asking the panel to reflect before deciding.

use crate::flow::entities::Turn;
use serde::Serialize;
use std::fmt::Write;

/// Summary used when the flow has no turns yet
pub const NO_PRIOR_REASONING: &str = "No prior reasoning available.";

const REFLECTION_PREAMBLE: &str = "You are continuing a multi-step diagnostic panel reasoning process.
Below is a concise summary of prior reasoning steps.";

const REFLECTION_DIRECTIVE: &str = "Reflect before deciding:
- Tests proposed in prior rounds have not been performed. Do not recommend them again as if new.
- Keep differential probabilities consistent with the existing information; no new data has arrived.
- Raise certainty only when the consistency of the reasoning has improved.
- Resolve any contradiction you detect within this step.
Then produce the next panel output in strict JSON.";

/// One line pair per turn, in step order.
pub fn digest(turns: &[Turn]) -> String {
    let mut out = String::new();
    for (i, turn) in turns.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let consensus = &turn.consensus;
        let _ = write!(
            out,
            "Step {}: Action={}, Certainty={}.\n    Questions={}, Orders={}, Diagnosis={}.",
            turn.step_index,
            consensus.action,
            consensus.certainty,
            render(consensus.questions.as_ref()),
            render(consensus.orders.as_ref()),
            render(consensus.diagnosis.as_ref()),
        );
    }
    out
}

/// The memory summary for the next oracle call.
///
/// With no prior turns this is exactly [`NO_PRIOR_REASONING`].
pub fn reflective_summary(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return NO_PRIOR_REASONING.to_string();
    }

    format!(
        "{}\n\n{}\n\n{}",
        REFLECTION_PREAMBLE,
        digest(turns),
        REFLECTION_DIRECTIVE
    )
}

fn render<T: Serialize>(value: Option<&T>) -> String {
    value
        .and_then(|v| serde_json::to_string(v).ok())
        .unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::entities::FlowId;
    use crate::panel::action::PanelAction;
    use crate::panel::resolve::FinalConsensus;
    use crate::panel::schema::fallback_output;

    fn order_turn(step: u32, orders: &[&str], certainty: f64) -> Turn {
        let consensus = FinalConsensus {
            action: PanelAction::Order,
            rationale: "r".to_string(),
            questions: None,
            orders: Some(orders.iter().map(|o| o.to_string()).collect()),
            diagnosis: None,
            certainty,
        };
        Turn::new(FlowId::new("f"), step, fallback_output(), consensus)
    }

    #[test]
    fn test_empty_history_is_the_bare_literal() {
        assert_eq!(reflective_summary(&[]), "No prior reasoning available.");
    }

    #[test]
    fn test_digest_line_format() {
        let turns = vec![order_turn(1, &["CXR", "CRP"], 0.45)];
        assert_eq!(
            digest(&turns),
            "Step 1: Action=ORDER, Certainty=0.45.\n    Questions=none, Orders=[\"CXR\",\"CRP\"], Diagnosis=none."
        );
    }

    #[test]
    fn test_summary_wraps_digest_with_directive() {
        let turns = vec![order_turn(1, &["CXR"], 0.4), order_turn(2, &["FBC"], 0.5)];
        let summary = reflective_summary(&turns);
        assert!(summary.starts_with(REFLECTION_PREAMBLE));
        assert!(summary.contains("Step 1: Action=ORDER"));
        assert!(summary.contains("Step 2: Action=ORDER, Certainty=0.5."));
        assert!(summary.ends_with("strict JSON."));
        assert!(summary.contains("have not been performed"));
    }
}
