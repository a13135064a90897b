//! Flow lifecycle: sessions, turns, termination and reports

pub mod entities;
pub mod policy;
pub mod report;

pub use entities::{CaseId, Flow, FlowId, FlowStatus, StepOutcome, Turn};
pub use policy::{
    DEFAULT_COMMIT_THRESHOLD, DEFAULT_MAX_STEPS, MAX_STEP_BUDGET, TerminationPolicy,
    clamp_step_budget,
};
pub use report::{FlowReport, render_markdown};
