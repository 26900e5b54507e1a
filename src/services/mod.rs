//! Services Module
//!
//! The analysis session and the helpers it relies on.

pub mod analysis;
pub mod targets;

pub use analysis::{classify, AnalysisSession, Classification, RunState};
pub use targets::is_module_or_package;
