//! Reconciliation shared by every aligner: clamping, synthetic timing,
//! repetition expansion, sanitizing and the canonical timeline.

pub mod clamp;
pub mod even;
pub mod repetition;
pub mod sanitize;
pub mod timeline;

pub use repetition::RepetitionPlan;
pub use sanitize::SanitizeReport;
pub use timeline::{Canonical, Clamped, Raw, Sanitized, Timeline};
