//! Error types for the financial query orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Dispatch Errors
    // =============================

    #[error("Collaborator error: {0}")]
    CollaboratorError(String),

    #[error("Capability not registered: {0}")]
    CapabilityNotRegistered(String),

    #[error("Invalid collaborator input: {0}")]
    InvalidCollaboratorInput(String),

    #[error("{capability} timed out after {timeout_ms} ms")]
    CapabilityTimeout { capability: String, timeout_ms: u64 },

    #[error("All capabilities failed: {0}")]
    TotalDispatchFailure(String),

    // =============================
    // Collaborator Support
    // =============================

    #[error("Corporate code table error: {0}")]
    CorpCodeError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
