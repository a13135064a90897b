//! Progress notification port
//!
//! Defines the interface for reporting progress while a panel run executes.

use panel_domain::{FinalConsensus, FlowId, SamplingDecision};

/// Callback for progress updates during a panel run
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console, web UI, etc.)
pub trait PanelProgressNotifier: Send + Sync {
    /// Called once the flow has been created
    fn on_flow_start(&self, flow_id: &FlowId, max_steps: u32);

    /// Called before the oracle is invoked for a step
    fn on_step_start(&self, step_index: u32, sampling: &SamplingDecision);

    /// Called after the turn has been persisted
    fn on_step_complete(&self, step_index: u32, consensus: &FinalConsensus, used_fallback: bool);

    /// Called when the run stops
    fn on_run_complete(&self, _steps_run: u32, _reason: &str) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl PanelProgressNotifier for NoProgress {
    fn on_flow_start(&self, _flow_id: &FlowId, _max_steps: u32) {}
    fn on_step_start(&self, _step_index: u32, _sampling: &SamplingDecision) {}
    fn on_step_complete(&self, _step_index: u32, _consensus: &FinalConsensus, _used_fallback: bool) {}
}
