//! Prompt composition for a panel turn

use super::action::PanelAction;
use super::persona::{Persona, PersonaHint};
use crate::case::snapshot::CaseState;
use serde_json::{Value, json};

/// Templates for the single-call panel prompt
pub struct PanelPromptTemplate;

impl PanelPromptTemplate {
    /// Fixed panel charter: the five personas and the action taxonomy.
    pub fn charter() -> String {
        let mut text = String::from(
            "You are a single clinical reasoning system simulating a five-member medical panel.\n\nPersonas:\n",
        );

        for (i, persona) in Persona::ALL.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} - {}\n",
                i + 1,
                persona.display_name(),
                persona.mandate()
            ));
        }

        text.push_str("\nAfter discussion, the panel must agree on one ACTION:\n");
        for action in PanelAction::ALL {
            text.push_str(&format!(
                "- \"{}\" -> {}\n",
                action,
                Self::action_meaning(action)
            ));
        }

        text.push_str(
            r#"
The panel's collective "certainty" (0.0-1.0) is its average confidence in the decision for this round.

Each iteration is a new round of reasoning. The panel must self-evaluate:
- Identify inconsistencies or redundant tests from prior steps.
- Update probabilities and certainty from internal logic, not random drift.
- Raise certainty only when reasoning consistency improves.
- Different personas may take the lead in different rounds.

Keep in mind:
- No new information is introduced between rounds.
- Tests and questions from previous rounds are proposals only; they have not been performed and no results are available.
- The panel reasons hypothetically until it commits to a diagnosis.

Output ONLY valid JSON matching the schema the user provides. Use Australian primary-care context."#,
        );

        text
    }

    fn action_meaning(action: PanelAction) -> &'static str {
        match action {
            PanelAction::Ask => "up to 3 questions for the patient.",
            PanelAction::Order => "up to 3 diagnostic tests (after stewardship veto).",
            PanelAction::Commit => "final diagnosis.",
        }
    }

    /// Inline description of the output contract, sent with every turn.
    pub fn schema_description() -> &'static str {
        "The JSON must include {personas: {...}, consensus: {...}}. \
         personas has the keys hypothesis {top3: [{dx, probability, key_features}]}, \
         test_chooser {tests}, challenger {anchoring_risks, contradictions, falsification_tests}, \
         stewardship {vetoed_tests, cheaper_alternatives} and checklist {consistency_ok, safety_flags}. \
         The consensus object MUST contain: action (ASK, ORDER, or COMMIT); \
         rationale (short paragraph explaining the reasoning); certainty (0.0-1.0); \
         and exactly ONE of the following depending on action: \
         - if action='ASK', include a non-empty 'questions' array (up to 3 concise patient questions); \
         - if action='ORDER', include a non-empty 'orders' array (up to 3 diagnostic tests); \
         - if action='COMMIT', include a 'diagnosis' string describing the final diagnosis."
    }

    /// System instruction: charter, optional hint, JSON-only reminder.
    pub fn system(hint: Option<PersonaHint>) -> String {
        format!(
            "{}\n\n{}\n\nYou must respond ONLY in valid JSON matching the schema provided.",
            Self::charter(),
            hint.map(|h| h.directive()).unwrap_or_default()
        )
    }

    /// User payload: case, memory summary and the schema description.
    pub fn user_payload(case: &CaseState, memory: &str) -> Value {
        json!({
            "patient": case,
            "prior": memory,
            "schema": Self::schema_description(),
        })
    }
}
