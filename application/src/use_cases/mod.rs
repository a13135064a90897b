//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod invoke_reasoning;
pub mod panel_flow;
pub mod run_panel;

#[cfg(test)]
pub(crate) mod test_support;
