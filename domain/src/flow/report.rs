//! Report artifact written when a flow commits

use super::entities::{CaseId, FlowId};
use crate::panel::resolve::FinalConsensus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task type recorded on every diagnosis report
pub const DIAGNOSIS_TASK: &str = "diagnosis";

/// A rendered diagnosis report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow_id: FlowId,
    pub case_id: CaseId,
    pub task_type: String,
    pub model_name: String,
    pub markdown: String,
    pub created_at: DateTime<Utc>,
}

impl FlowReport {
    pub fn for_commit(
        flow_id: FlowId,
        case_id: CaseId,
        model_name: impl Into<String>,
        consensus: &FinalConsensus,
    ) -> Self {
        Self {
            flow_id,
            case_id,
            task_type: DIAGNOSIS_TASK.to_string(),
            model_name: model_name.into(),
            markdown: render_markdown(consensus),
            created_at: Utc::now(),
        }
    }
}

/// `**Diagnosis:** <diagnosis>\n\n<rationale>`
pub fn render_markdown(consensus: &FinalConsensus) -> String {
    format!(
        "**Diagnosis:** {}\n\n{}",
        consensus.diagnosis.as_deref().unwrap_or_default(),
        consensus.rationale
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::action::PanelAction;

    #[test]
    fn test_report_markdown() {
        let consensus = FinalConsensus {
            action: PanelAction::Commit,
            rationale: "Focal crackles with fever.".to_string(),
            questions: None,
            orders: None,
            diagnosis: Some("Community-acquired pneumonia".to_string()),
            certainty: 0.85,
        };

        let report = FlowReport::for_commit(
            FlowId::new("f-1"),
            CaseId::new("c-1"),
            "gpt-4o-mini",
            &consensus,
        );
        assert_eq!(
            report.markdown,
            "**Diagnosis:** Community-acquired pneumonia\n\nFocal crackles with fever."
        );
        assert_eq!(report.task_type, "diagnosis");
        assert_eq!(report.model_name, "gpt-4o-mini");
    }
}
