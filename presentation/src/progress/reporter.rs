//! Progress reporting for panel runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use panel_application::PanelProgressNotifier;
use panel_domain::{FinalConsensus, FlowId, PanelAction, SamplingDecision};
use std::sync::Mutex;

/// Reports progress during a panel run with a progress bar
pub struct ProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock()
            && let Some(pb) = guard.as_ref()
        {
            f(pb);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn action_label(consensus: &FinalConsensus) -> String {
    let label = format!("{} {:.2}", consensus.action, consensus.certainty);
    match consensus.action {
        PanelAction::Ask => label.blue().to_string(),
        PanelAction::Order => label.yellow().to_string(),
        PanelAction::Commit => label.green().to_string(),
    }
}

fn sampling_note(sampling: &SamplingDecision) -> String {
    match sampling.hint {
        Some(hint) => format!(
            "exploring ({} leads, T={:.2})",
            hint.persona().display_name(),
            sampling.temperature
        ),
        None => "reasoning...".to_string(),
    }
}

impl PanelProgressNotifier for ProgressReporter {
    fn on_flow_start(&self, _flow_id: &FlowId, max_steps: u32) {
        let pb = ProgressBar::new(max_steps as u64);
        pb.set_style(Self::bar_style());
        pb.set_prefix("Panel");
        pb.set_message("Starting...");

        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(pb);
        }
    }

    fn on_step_start(&self, step_index: u32, sampling: &SamplingDecision) {
        let message = format!("step {}: {}", step_index, sampling_note(sampling));
        self.with_bar(|pb| pb.set_message(message));
    }

    fn on_step_complete(&self, step_index: u32, consensus: &FinalConsensus, used_fallback: bool) {
        let mut message = format!("step {}: {}", step_index, action_label(consensus));
        if used_fallback {
            message.push_str(&format!(" {}", "fallback".red()));
        }
        self.with_bar(|pb| {
            pb.set_message(message);
            pb.inc(1);
        });
    }

    fn on_run_complete(&self, steps_run: u32, reason: &str) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(pb) = guard.take()
        {
            pb.finish_with_message(format!(
                "{} after {} step(s)",
                reason.green(),
                steps_run
            ));
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl PanelProgressNotifier for SimpleProgress {
    fn on_flow_start(&self, flow_id: &FlowId, max_steps: u32) {
        println!(
            "{} {} (up to {} steps)",
            "->".cyan(),
            format!("Flow {}", flow_id).bold(),
            max_steps
        );
    }

    fn on_step_start(&self, step_index: u32, sampling: &SamplingDecision) {
        if sampling.is_exploring() {
            println!("  {} step {}: {}", "~".yellow(), step_index, sampling_note(sampling));
        }
    }

    fn on_step_complete(&self, step_index: u32, consensus: &FinalConsensus, used_fallback: bool) {
        let marker = if used_fallback { "x".red() } else { "v".green() };
        println!("  {} step {}: {}", marker, step_index, action_label(consensus));
    }

    fn on_run_complete(&self, steps_run: u32, reason: &str) {
        println!("{} {} after {} step(s)\n", "->".cyan(), reason.bold(), steps_run);
    }
}
