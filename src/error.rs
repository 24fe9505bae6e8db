//! Workflow error taxonomy
//!
//! One typed enum covering every failure the workflow engine can surface.
//! Per-target failures during a bulk run are not errors - they are captured
//! in the target's `OperationOutcome` and the batch keeps going.

use thiserror::Error;

/// Errors surfaced by the workflow engine and its components.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Region id is not in the static region table. Rejected before any
    /// network call.
    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    /// Connection, TLS, or timeout failure - no status code was received.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response from the management API, carrying the server's
    /// detail message when it sent one.
    #[error("remote API error (HTTP {status}): {detail}")]
    RemoteApi { status: u16, detail: String },

    /// The site catalog could not be fetched or decoded.
    #[error("failed to fetch site catalog: {detail}")]
    CatalogFetch { detail: String },

    /// Malformed tabular import input.
    #[error("import parse failure: {0}")]
    ImportParse(String),

    /// Column mapping assignments name headers absent from the file.
    #[error("unbound fields: {}", .0.join(", "))]
    UnboundFields(Vec<String>),

    /// An execute stage was entered with nothing selected.
    #[error("no resources selected")]
    EmptySelection,

    /// Input arrived while the session was in a different stage. The
    /// session is left untouched.
    #[error("input not valid in stage '{actual}' (expected stage '{expected}')")]
    WrongStage {
        expected: crate::workflow::Stage,
        actual: crate::workflow::Stage,
    },
}

impl From<csv::Error> for WorkflowError {
    fn from(err: csv::Error) -> Self {
        WorkflowError::ImportParse(err.to_string())
    }
}
