//! Domain error types.

use thiserror::Error;

/// Errors raised by the exploration engine and its collaborators.
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Invalid node key '{0}': expected <type>:<id>")]
    InvalidNodeKey(String),

    #[error("Invalid click '{0}': expected <type>:<id>@<millis>")]
    InvalidClick(String),

    #[error("Unknown graph kind: {0}")]
    UnknownKind(String),

    #[error("Graph source '{source_name}' failed: {message}")]
    Source {
        source_name: &'static str,
        message: String,
    },

    #[error("Failed to parse graph data: {0}")]
    GraphData(#[from] serde_json::Error),

    #[error("Task API error ({status}): {body}")]
    TaskApi { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
