//! Runner Models
//!
//! Data structures describing a subprocess invocation and what it produced.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use coverage_panel_core::Phase;

/// Which captured stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// A single command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable to launch
    pub program: PathBuf,
    /// Arguments for the command
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: PathBuf,
}

impl CommandSpec {
    /// Create a new command spec with no arguments
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    /// Add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build the invocation for one analysis phase.
    ///
    /// `Execute` runs `<tool> run <target>`, `Report` runs `<tool> report`.
    /// Both use the target's parent directory as the working directory so
    /// that relative imports resolve and the report finds the measurement.
    pub fn for_phase(tool: &Path, phase: Phase, target: &Path) -> Self {
        let working_dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let spec = Self::new(tool, working_dir).arg(phase.subcommand());
        match phase {
            Phase::Execute => spec.arg(target.to_string_lossy()),
            Phase::Report => spec,
        }
    }

    /// Render the command line for logging
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Text drained from a running process since the previous drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputChunk {
    pub stdout: String,
    pub stderr: String,
}

impl OutputChunk {
    /// True if neither stream produced anything
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// Accumulated output of one phase, each stream in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutput {
    pub stdout: String,
    pub stderr: String,
}

impl PhaseOutput {
    /// Append a drained chunk
    pub fn append(&mut self, chunk: OutputChunk) {
        self.stdout.push_str(&chunk.stdout);
        self.stderr.push_str(&chunk.stderr);
    }

    /// stderr followed by stdout, as shown in the "complete output" log
    pub fn combined(&self) -> String {
        format!("{}{}", self.stderr, self.stdout)
    }
}

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    /// Exit code, `None` when terminated by a signal or unknown
    pub code: Option<i32>,
    /// Whether the process was terminated through `kill`
    pub killed: bool,
}

impl ExitOutcome {
    /// A natural exit
    pub fn exited(code: Option<i32>) -> Self {
        Self {
            code,
            killed: false,
        }
    }

    /// A forced termination
    pub fn killed(code: Option<i32>) -> Self {
        Self { code, killed: true }
    }

    /// Exit code 0 without being killed
    pub fn success(&self) -> bool {
        !self.killed && self.code == Some(0)
    }
}
