//! Domain layer for diagnostic-panel
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Panel
//!
//! A single reasoning oracle simulates a five-persona clinical panel. Each
//! turn converges on one action:
//!
//! - **ASK**: clarifying questions for the patient
//! - **ORDER**: diagnostic tests (after the stewardship veto)
//! - **COMMIT**: a final diagnosis
//!
//! ## Flow
//!
//! A flow is a turn-based session over one case. It ends on a COMMIT with
//! enough certainty, or when the step budget runs out.

pub mod case;
pub mod core;
pub mod flow;
pub mod panel;

// Re-export commonly used types
pub use case::{CaseField, CaseSnapshot, CaseState, SnapshotAnomaly, StoredCaseFields};
pub use core::error::DomainError;
pub use flow::{
    CaseId, DEFAULT_COMMIT_THRESHOLD, DEFAULT_MAX_STEPS, Flow, FlowId, FlowReport, FlowStatus,
    MAX_STEP_BUDGET, StepOutcome, TerminationPolicy, Turn, clamp_step_budget,
};
pub use panel::{
    action::PanelAction,
    exploration::SamplingDecision,
    memory::{NO_PRIOR_REASONING, reflective_summary},
    normalize::{NormalizedOutput, ParseError, normalize},
    output::{ConsensusDecision, PanelConsensus, PanelOutput, PersonaSections},
    persona::{Persona, PersonaHint, choose_hint},
    prompt::PanelPromptTemplate,
    repetition::is_repeating,
    resolve::{FinalConsensus, resolve},
    schema::{
        FALLBACK_QUESTION, FALLBACK_RATIONALE, FallbackReason, SchemaViolation, ValidatedOutput,
        accept, fallback_output, validate,
    },
};
