//! The diagnostic panel: personas, oracle output handling and consensus.
//!
//! One oracle response passes through these stages, in order:
//!
//! 1. [`normalize`] repairs key, type and section drift
//! 2. [`schema`] validates and substitutes the fallback on failure
//! 3. [`resolve`] applies the stewardship veto and fills the rationale
//!
//! [`memory`], [`repetition`] and [`exploration`] shape the next request.

pub mod action;
pub mod exploration;
pub mod memory;
pub mod normalize;
pub mod output;
pub mod persona;
pub mod prompt;
pub mod repetition;
pub mod resolve;
pub mod schema;
