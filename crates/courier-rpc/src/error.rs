use thiserror::Error;

/// Routing failures raised before any handler runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler registered under the requested name. Empty method names
    /// land here as well, without a registry lookup.
    #[error("method '{0}' not implemented")]
    MethodNotFound(String),
}

/// Failures decoding a response envelope's payload.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope has no result to decode.
    #[error("response carries no result")]
    MissingResult,
    /// The carried result does not match the requested type.
    #[error("invalid result payload: {0}")]
    Json(#[from] serde_json::Error),
}
