use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Definition errors
    #[error("Workflow not found: {0}")]
    DefinitionNotFound(String),

    #[error("Workflow {id} is malformed: {reason}")]
    DefinitionMalformed { id: String, reason: String },

    // External call errors
    #[error("Action failed: {kind}: {message}")]
    ActionFailed { kind: String, message: String },

    #[error("Send to {recipient} failed: {message}")]
    SendFailed { recipient: String, message: String },

    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    // Execution errors
    #[error("Node visit limit exceeded ({0} visits)")]
    LoopBoundExceeded(usize),

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

pub type Result<T> = std::result::Result<T, FlowError>;
