//! Storage Layer
//!
//! JSON configuration and the persistent result history.

pub mod config;
pub mod result_store;

pub use config::ConfigService;
pub use result_store::{ResultStore, RESULTS_FORMAT_VERSION};
