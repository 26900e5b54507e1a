//! Coverage Panel Core
//!
//! Foundational error types and upstream event types for the Coverage Panel
//! workspace. This crate has no dependencies on process management, storage,
//! or the async runtime.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `failure` - Upstream failure taxonomy (`AnalysisFailure`)
//! - `events` - Notifications delivered to the host (`AnalysisEvent`, `Phase`)
//!
//! ## Design Principles
//!
//! 1. **Only serde/thiserror** - keeps build times minimal
//! 2. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod events;
pub mod failure;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Failure Taxonomy ───────────────────────────────────────────────────
pub use failure::AnalysisFailure;

// ── Events ─────────────────────────────────────────────────────────────
pub use events::{AnalysisEvent, Phase};
