//! Shared errors, severities, and validation issues for the flowcert compiler.
//!
//! This crate provides the foundational types used across all other flowcert crates:
//! - `FlowError`: structural failures that abort a compile or a validation call
//! - `Issue`: a single validation finding (never an error value)
//! - `Severity`: ordering of findings from `Info` to `Error`

use serde::{Deserialize, Serialize};

/// Unified error type for all flowcert subsystems.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    // === Registry / Factory Errors ===
    #[error("No factory registered for component kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("Factory '{kind}' failed on node '{node}': {message}")]
    Factory {
        kind: String,
        node: String,
        message: String,
    },

    #[error("Spec generation failed on node '{node}': {message}")]
    Spec { node: String, message: String },

    // === Template Scanner Errors ===
    #[error("Template scan error at offset {offset}: {message}")]
    TemplateScan { offset: usize, message: String },

    // === Adapter Errors ===
    #[error("Adapter '{adapter}' failed to transform node '{node}': {message}")]
    Adapter {
        adapter: String,
        node: String,
        message: String,
    },

    // === Validator Engine Errors ===
    #[error("Invalid validator configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid regex '{pattern}': {message}")]
    RegexCompile { pattern: String, message: String },

    #[error("Regex '{pattern}' exceeded {timeout_ms}ms (possible ReDoS)")]
    RegexTimeout { pattern: String, timeout_ms: u64 },

    #[error("Hook {url} returned HTTP {status}: {message}")]
    Hook {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Hook {url} timed out after {timeout_ms}ms")]
    HookTimeout { url: String, timeout_ms: u64 },

    #[error("Guard expression error: {0}")]
    Guard(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl FlowError {
    /// Returns `true` for failures that abort a compile call outright.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FlowError::UnknownKind { .. }
                | FlowError::Factory { .. }
                | FlowError::Spec { .. }
                | FlowError::TemplateScan { .. }
                | FlowError::Adapter { .. }
        )
    }

    /// Returns `true` for runtime infrastructure failures of the validator
    /// engine. These must never be read as "no route matched".
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            FlowError::RegexTimeout { .. }
                | FlowError::Hook { .. }
                | FlowError::HookTimeout { .. }
        )
    }
}

/// A convenience alias for `Result<T, FlowError>`.
pub type Result<T> = std::result::Result<T, FlowError>;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// A validation finding. Issues are plain values: created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable machine-readable identifier, e.g. `topology.start.global_missing`.
    pub code: String,
    pub severity: Severity,
    /// Pointer into the design, e.g. `graph.edges[3]` or `plan.routes[0]`.
    pub path: String,
    #[serde(rename = "msg")]
    pub message: String,
}

impl Issue {
    pub fn new(
        severity: Severity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn error(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, path, message)
    }

    pub fn warn(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, code, path, message)
    }

    pub fn info(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, path, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} at {}: {}", self.severity, self.code, self.path, self.message)
    }
}

/// `true` when any issue carries `Error` severity. Callers treat a design as
/// valid exactly when this returns `false`.
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(Issue::is_error)
}

/// Number of issues at the given severity.
pub fn count_by_severity(issues: &[Issue], severity: Severity) -> usize {
    issues.iter().filter(|i| i.severity == severity).count()
}
