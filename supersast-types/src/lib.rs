//! Shared DTOs (schemas-as-code) for the supersast workspace.
//!
//! # Design constraints
//! - [`report::RunReport`] is serialized to disk next to the transcript.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod report;
pub mod tool;

/// Schema identifiers.
pub mod schema {
    pub const SUPERSAST_REPORT_V1: &str = "supersast.report.v1";
}
