//! Application-level configuration.
//!
//! - [`PanelParams`] - step budget, commit threshold, stagnation and seed

pub mod panel_params;

pub use panel_params::{DEFAULT_STAGNATION_EPSILON, DEFAULT_STAGNATION_WINDOW, PanelParams};
