//! Error types for the ivcheck conformance oracle.
//!
//! One enum covers the whole workspace. The first three variants are the
//! fatal kinds that end an action sequence; everything after them is either
//! recorded-but-nonfatal (shutdown) or infrastructure plumbing (config, I/O).

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias used throughout the ivcheck workspace.
pub type Result<T> = std::result::Result<T, IvError>;

/// Errors that can arise while driving a cache conformance run.
#[derive(Error, Debug)]
pub enum IvError {
    // === Fatal action-sequence errors ===
    /// An authored action fails structural validation. This is a
    /// test-authoring defect, never a cache-protocol failure, and is never
    /// retried.
    #[error("action {index} is malformed: {reason}")]
    MalformedAction { index: usize, reason: String },

    /// The external client process exited non-zero (or could not be
    /// spawned). Infrastructure failure: the remaining actions are skipped.
    #[error("action {index}: client exited {exit_code}: {stderr}")]
    InvocationFailure {
        index: usize,
        exit_code: i32,
        stderr: String,
    },

    /// A decoded wire result disagrees with the action's expectation.
    #[error("action {index}: {what} mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch {
        index: usize,
        /// Which part of the echo disagreed: `return_code`, `key`, `value`.
        what: &'static str,
        expected: String,
        actual: String,
    },

    /// A wire-result file could not be parsed. The client violated its
    /// output contract, so this counts as an infrastructure failure.
    #[error("action {index}: wire result at '{path}' is unreadable: {detail}")]
    WireResult {
        index: usize,
        path: PathBuf,
        detail: String,
    },

    // === Nonfatal, recorded errors ===
    /// An individual shutdown invocation failed. Recorded, never fatal,
    /// never prevents subsequent shutdown attempts.
    #[error("shutdown of rank {rank} failed: {detail}")]
    ShutdownFailure { rank: u32, detail: String },

    // === Environment errors ===
    /// The deployment environment is missing something the oracle needs
    /// (e.g. the shared result-exchange directory).
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IvError {
    /// Machine-readable kind tag used in run reports.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::MalformedAction { .. } => "malformed_action",
            Self::InvocationFailure { .. } | Self::WireResult { .. } => "invocation_failure",
            Self::ProtocolMismatch { .. } => "protocol_mismatch",
            Self::ShutdownFailure { .. } => "shutdown_failure",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
        }
    }

    /// The action index this error is anchored to, when there is one.
    #[must_use]
    pub fn action_index(&self) -> Option<usize> {
        match self {
            Self::MalformedAction { index, .. }
            | Self::InvocationFailure { index, .. }
            | Self::ProtocolMismatch { index, .. }
            | Self::WireResult { index, .. } => Some(*index),
            _ => None,
        }
    }
}
