//! Data Models
//!
//! Configuration and persisted result types.

pub mod result;
pub mod settings;

pub use result::StoredResult;
pub use settings::{AnalysisConfig, SettingsUpdate};
