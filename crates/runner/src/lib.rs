//! Coverage Panel Runner
//!
//! Launches the external coverage tool, captures its output incrementally, and
//! reports completion. This crate provides:
//!
//! - `models` - Command and output types (CommandSpec, OutputChunk, ExitOutcome)
//! - `decode` - Chunk-safe text decoding for captured streams
//! - `process` - The `ProcessRunner` / `RunningProcess` seam and its tokio implementation
//! - `locator` - Locating the tool executable and probing its version
//!
//! The runner manages one process per handle and enforces nothing about how
//! many handles exist at once; single-flight is the session's policy.

pub mod decode;
pub mod locator;
pub mod models;
pub mod process;

pub use coverage_panel_core::Phase;

// Re-export model types
pub use models::{CommandSpec, ExitOutcome, OutputChunk, PhaseOutput, StreamKind};

// Re-export process types
pub use process::{ProcessRunner, RunningProcess, TokioProcess, TokioProcessRunner};

// Re-export locator
pub use locator::{install_hint, parse_version_output, ToolInfo, ToolLocator};

pub use decode::StreamDecoder;
