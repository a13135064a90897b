//! Output formatter trait

use panel_application::PanelRunReport;

/// Trait for formatting panel run reports
pub trait OutputFormatter {
    /// Format the complete run
    fn format(&self, report: &PanelRunReport) -> String;

    /// Format as JSON
    fn format_json(&self, report: &PanelRunReport) -> String;

    /// Format the final consensus only (concise output)
    fn format_summary(&self, report: &PanelRunReport) -> String;
}
