use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::EnvelopeError;

/// Result of a method invocation as it travels back over the wire.
///
/// A populated `result` and a non-empty `error` are mutually exclusive in
/// everything this crate produces: the constructors clear one side when they
/// set the other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    /// Opaque result payload, absent on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    /// Handler-reported failure message, empty on success.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Correlation id copied from the request.
    #[serde(default)]
    pub id: u64,
}

impl Response {
    /// Build a success envelope carrying `result` serialised verbatim.
    ///
    /// A result that fails to serialise degrades into an error envelope with
    /// the serialisation failure as its message.
    pub fn ok<T>(id: u64, result: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match serde_json::value::to_raw_value(result) {
            Ok(raw) => Self {
                result: Some(raw),
                error: String::new(),
                id,
            },
            Err(err) => Self::err(id, err.to_string()),
        }
    }

    /// Build an error envelope; the message reaches callers verbatim.
    pub fn err(id: u64, error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: error.into(),
            id,
        }
    }

    /// Map a handler outcome onto an envelope: `Ok` serialises the value,
    /// `Err` becomes an error envelope with the error's display text.
    pub fn from_result<T, E>(id: u64, result: Result<T, E>) -> Self
    where
        T: Serialize,
        E: std::fmt::Display,
    {
        match result {
            Ok(value) => Self::ok(id, &value),
            Err(err) => Self::err(id, err.to_string()),
        }
    }

    /// True when the envelope carries a failure message.
    pub fn is_err(&self) -> bool {
        !self.error.is_empty()
    }

    /// Decode the carried result into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        match &self.result {
            Some(raw) => Ok(serde_json::from_str(raw.get())?),
            None => Err(EnvelopeError::MissingResult),
        }
    }
}
