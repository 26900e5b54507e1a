//! Utilities Module
//!
//! Common utilities used throughout the library.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::*;
pub use paths::*;
