//! Logging infrastructure: structured audit logging.
//!
//! Provides [`JsonlAuditLogger`], a JSONL file writer that implements
//! the [`AuditLogger`](panel_application::AuditLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlAuditLogger;
