use thiserror::Error;

/// Top-level error type for HybridFlow.
#[derive(Debug, Error)]
pub enum HybridflowError {
    /// No tenant is configured for the gateway instance named in an event.
    #[error("unknown instance: {0}")]
    UnknownInstance(String),

    /// The LLM backend failed to produce a reply (rate limit, timeout, API error).
    #[error("generation failed: {0}")]
    Generation(String),

    /// The WhatsApp gateway rejected or failed a request.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The WhatsApp gateway did not answer within the request timeout.
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),

    /// The external workflow hook failed.
    #[error("workflow error: {0}")]
    Workflow(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Storage error.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
