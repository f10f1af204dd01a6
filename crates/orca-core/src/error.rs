use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrcaError {
    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // Response shape errors
    #[error("Malformed response from {route}: {message}")]
    MalformedResponse { route: String, message: String },

    // Graph contract errors
    #[error("Duplicate node id in graph document: {0}")]
    DuplicateNode(String),

    #[error("Edge {from} -> {to} references a node missing from the graph")]
    DanglingEdge { from: String, to: String },

    // Navigation errors
    #[error("No workflow selected")]
    NoWorkflowSelected,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OrcaError {
    /// Whether this error means the engine handed us a graph we cannot trust.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            OrcaError::DuplicateNode(_) | OrcaError::DanglingEdge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OrcaError>;
