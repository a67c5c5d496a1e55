//! Crate-wide error taxonomy.
//!
//! Mirrors the five error kinds of the design: malformed input, missing
//! on-disk resources, broken structural invariants, non-fatal runtime
//! conditions, and internal logic bugs. `InputFormat` and `Resource` abort
//! scenario loading; `Invariant` aborts tree construction; `Runtime` is
//! logged and the offending subtree contributes zero utility; `Logic` is
//! fatal and must never be silently swallowed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("input format: {0}")]
    InputFormat(String),

    #[error("resource: {0}")]
    Resource(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("runtime: {0}")]
    Runtime(String),

    #[error("logic error (this is a bug): {0}")]
    Logic(String),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    /// The short tag printed alongside the human message in the terminal log
    /// line, e.g. `[InputFormat] malformed range string`.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            SolverError::InputFormat(_) => "InputFormat",
            SolverError::Resource(_) => "Resource",
            SolverError::Invariant(_) => "Invariant",
            SolverError::Runtime(_) => "Runtime",
            SolverError::Logic(_) => "Logic",
        }
    }

    /// Render the single terminal log line described for error surfacing.
    pub fn log_line(&self) -> String {
        format!("[{}] {}", self.kind_tag(), self)
    }
}
