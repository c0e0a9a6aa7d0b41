use thiserror::Error;

/// Everything a [`Client`](crate::Client) call can fail with.
///
/// The display forms are part of the API surface: callers match on the text
/// to tell an unimplemented method (`bad status 501 ...`) from a rejected
/// credential (`bad status 401 ...`) or a handler's own failure message.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured endpoint is not a usable http(s) URL.
    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The underlying HTTP client could not be constructed.
    #[error("can't build HTTP client: {source}")]
    Init {
        #[source]
        source: reqwest::Error,
    },
    /// Request params failed to serialise.
    #[error("can't encode request for {method}: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    /// The call did not complete within the client timeout.
    #[error("call {method} timed out")]
    Timeout { method: String },
    /// The transport failed below HTTP semantics.
    #[error("transport failure for {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered outside the 2xx range; no envelope is parsed.
    #[error("bad status {status} for {method}")]
    BadStatus { method: String, status: String },
    /// A 2xx response did not carry a decodable envelope.
    #[error("can't decode response for {method}: {source}")]
    Protocol {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    /// The handler reported a failure; its message arrives verbatim.
    #[error("{0}")]
    Rpc(String),
}
