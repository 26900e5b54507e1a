//! Coverage Panel - Rust Backend Library
//!
//! Runs a coverage tool against a script in two phases (measure, then report),
//! keeps a bounded most-recent-first history of reports on disk, and notifies
//! a host UI as runs progress. It includes:
//! - The analysis session (single-flight run orchestration)
//! - Storage layer (result history, JSON config)
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use coverage_panel_core::{AnalysisEvent, AnalysisFailure, CoreError, CoreResult, Phase};
pub use coverage_panel_runner::{
    CommandSpec, ExitOutcome, OutputChunk, PhaseOutput, ProcessRunner, RunningProcess, ToolInfo,
    ToolLocator, TokioProcessRunner,
};

pub use models::{AnalysisConfig, SettingsUpdate, StoredResult};
pub use services::{classify, AnalysisSession, Classification, RunState};
pub use storage::{ConfigService, ResultStore};
pub use utils::error::{AppError, AppResult};
pub use utils::logging::init_tracing;
