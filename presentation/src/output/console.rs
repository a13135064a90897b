//! Console output formatter for panel runs

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use panel_application::{PanelRunReport, StepRecord};
use panel_domain::{FinalConsensus, PanelAction};

/// Formats panel run reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete run
    pub fn format(report: &PanelRunReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Diagnostic Panel Results"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Case:".cyan().bold(), report.case_id));
        output.push_str(&format!("{} {}\n", "Flow:".cyan().bold(), report.flow_id));
        output.push_str(&format!(
            "{} {} step(s), stopped: {}\n",
            "Run:".cyan().bold(),
            report.steps_run,
            report.stop_reason
        ));

        output.push_str(&Self::section_header("Steps"));
        for record in &report.turns {
            output.push_str(&Self::step(record));
        }

        output.push_str(&Self::section_header("Best Steps"));
        match &report.overall_best {
            Some(best) => output.push_str(&format!(
                "\n{} step {} ({}, certainty {:.2})\n",
                "Overall:".green().bold(),
                best.step_index,
                best.consensus.action,
                best.consensus.certainty
            )),
            None => output.push_str("\nNo steps recorded.\n"),
        }
        for action in [PanelAction::Ask, PanelAction::Order, PanelAction::Commit] {
            if let Some(best) = report.best_by_action.get(action) {
                output.push_str(&format!(
                    "  {:<7} step {} (certainty {:.2})\n",
                    action.as_str(),
                    best.step_index,
                    best.consensus.certainty
                ));
            }
        }

        if let Some(consensus) = report.final_consensus() {
            output.push_str(&Self::section_header("Final Consensus"));
            output.push('\n');
            output.push_str(&Self::consensus(consensus));
        }

        output.push_str(&Self::footer());

        output
    }

    /// Format as JSON
    pub fn format_json(report: &PanelRunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format the final consensus only
    pub fn format_summary(report: &PanelRunReport) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}\n\n",
            "=== Panel Conclusion ===".cyan().bold()
        ));
        output.push_str(&format!(
            "{} {} ({} step(s), {})\n\n",
            "Case:".bold(),
            report.case_id,
            report.steps_run,
            report.stop_reason
        ));

        match report.final_consensus() {
            Some(consensus) => output.push_str(&Self::consensus(consensus)),
            None => output.push_str("The panel produced no turns.\n"),
        }

        output
    }

    fn step(record: &StepRecord) -> String {
        let consensus = &record.consensus;
        let action = match consensus.action {
            PanelAction::Ask => consensus.action.as_str().blue(),
            PanelAction::Order => consensus.action.as_str().yellow(),
            PanelAction::Commit => consensus.action.as_str().green(),
        };
        let mut line = format!(
            "\n{} {} {}",
            format!("Step {:>2}", record.step_index).bold(),
            action.bold(),
            format!("certainty {:.2}", consensus.certainty).dimmed()
        );
        if record.used_fallback {
            line.push_str(&format!(" {}", "(fallback)".red()));
        }
        line.push('\n');
        line.push_str(&Self::indent(&Self::payload(consensus), "  "));
        line.push('\n');
        line
    }

    fn payload(consensus: &FinalConsensus) -> String {
        match consensus.action {
            PanelAction::Ask => consensus
                .questions
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|q| format!("? {}", q))
                .collect::<Vec<_>>()
                .join("\n"),
            PanelAction::Order => {
                let orders = consensus.final_orders();
                if orders.is_empty() {
                    "(all orders vetoed)".to_string()
                } else {
                    orders
                        .iter()
                        .map(|o| format!("+ {}", o))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            PanelAction::Commit => format!(
                "= {}",
                consensus.diagnosis.as_deref().unwrap_or("(no diagnosis)")
            ),
        }
    }

    fn consensus(consensus: &FinalConsensus) -> String {
        format!(
            "{} {} (certainty {:.2})\n{}\n\n{} {}\n",
            "Action:".bold(),
            consensus.action,
            consensus.certainty,
            Self::indent(&Self::payload(consensus), "  "),
            "Rationale:".bold(),
            consensus.rationale
        )
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &PanelRunReport) -> String {
        Self::format(report)
    }

    fn format_json(&self, report: &PanelRunReport) -> String {
        Self::format_json(report)
    }

    fn format_summary(&self, report: &PanelRunReport) -> String {
        Self::format_summary(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_application::{BestByAction, StopReason};
    use panel_domain::{CaseId, FlowId};

    fn record(step: u32, action: PanelAction, certainty: f64) -> StepRecord {
        StepRecord {
            step_index: step,
            consensus: FinalConsensus {
                action,
                rationale: "Because".to_string(),
                questions: (action == PanelAction::Ask).then(|| vec!["Any fever?".to_string()]),
                orders: (action == PanelAction::Order).then(Vec::new),
                diagnosis: (action == PanelAction::Commit).then(|| "Pneumonia".to_string()),
                certainty,
            },
            used_fallback: false,
        }
    }

    fn report() -> PanelRunReport {
        let ask = record(1, PanelAction::Ask, 0.3);
        let order = record(2, PanelAction::Order, 0.5);
        let commit = record(3, PanelAction::Commit, 0.9);
        PanelRunReport {
            flow_id: FlowId::new("flow-1"),
            case_id: CaseId::new("case-1"),
            steps_run: 3,
            stop_reason: StopReason::Committed,
            overall_best: Some(commit.clone()),
            best_by_action: BestByAction {
                ask: Some(ask.clone()),
                order: Some(order.clone()),
                commit: Some(commit.clone()),
            },
            turns: vec![ask, order, commit],
        }
    }

    #[test]
    fn test_full_output_lists_steps_and_diagnosis() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format(&report());
        assert!(text.contains("Step  1 ASK"));
        assert!(text.contains("? Any fever?"));
        assert!(text.contains("(all orders vetoed)"));
        assert!(text.contains("= Pneumonia"));
        assert!(text.contains("stopped: committed"));
    }

    #[test]
    fn test_summary_shows_final_consensus_only() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format_summary(&report());
        assert!(text.contains("= Pneumonia"));
        assert!(!text.contains("Step  1"));
    }

    #[test]
    fn test_json_output_is_camel_case() {
        let json: serde_json::Value =
            serde_json::from_str(&ConsoleFormatter::format_json(&report())).unwrap();
        assert_eq!(json["stepsRun"], 3);
        assert_eq!(json["stopReason"], "committed");
        assert_eq!(json["bestByAction"]["COMMIT"]["stepIndex"], 3);
    }
}
