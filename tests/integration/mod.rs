//! Integration Tests Module
//!
//! Tests cover the persistent result history, the analysis session driven by a
//! recording fake runner, configuration persistence, and an end-to-end run
//! against a stand-in coverage executable.

// Fake runner and shared helpers
mod support;



// Configuration service tests
mod config_test;

// Real subprocess tests (unix only)
mod end_to_end_test;
