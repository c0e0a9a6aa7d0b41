use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use url::Url;

use courier_rpc::{Request, Response};

use crate::error::ClientError;

/// Default end-to-end deadline for one call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`Client`].
pub struct ClientBuilder {
    api: String,
    auth: Option<(String, String)>,
    timeout: Duration,
}

impl ClientBuilder {
    fn new(api: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            auth: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Send basic auth with every call.
    pub fn auth(mut self, user: impl Into<String>, passwd: impl Into<String>) -> Self {
        self.auth = Some((user.into(), passwd.into()));
        self
    }

    /// End-to-end deadline per call, connect included. Default 30s.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        let api = Url::parse(&self.api).map_err(|err| ClientError::InvalidUrl {
            url: self.api.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: self.api,
                reason: format!("unsupported scheme '{}'", api.scheme()),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| ClientError::Init { source })?;

        Ok(Client {
            http,
            api,
            auth: self.auth,
            seq: AtomicU64::new(0),
        })
    }
}

/// Client for one courier RPC endpoint.
///
/// Holds a connection pool and the request-id sequence; share it behind an
/// `Arc` rather than constructing one per call.
pub struct Client {
    http: reqwest::Client,
    api: Url,
    auth: Option<(String, String)>,
    seq: AtomicU64,
}

impl Client {
    /// Client with default settings; see [`ClientBuilder`] for the knobs.
    pub fn new(api: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder(api).build()
    }

    pub fn builder(api: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api)
    }

    /// Invoke `method` with `params` and return the response envelope.
    ///
    /// `params` travel verbatim: a tuple sends positional params, a struct an
    /// object, a scalar a bare value, and `()` sends no params at all. The
    /// first call uses id 1 and each call increments from there.
    ///
    /// Any failure is a [`ClientError`]: non-2xx statuses keep their status
    /// line and skip envelope parsing, handler-reported errors surface their
    /// message verbatim. A successful envelope comes back with its raw result
    /// intact for [`Response::decode`].
    pub async fn call<P>(&self, method: &str, params: P) -> Result<Response, ClientError>
    where
        P: Serialize,
    {
        let id = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let request =
            Request::with_params(method, id, &params).map_err(|source| ClientError::Encode {
                method: method.to_string(),
                source,
            })?;

        let mut http_request = self.http.post(self.api.clone()).json(&request);
        if let Some((user, passwd)) = &self.auth {
            http_request = http_request.basic_auth(user, Some(passwd));
        }

        debug!(method = %method, id, "calling");
        let rsp = http_request
            .send()
            .await
            .map_err(|err| transport_error(method, err))?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(ClientError::BadStatus {
                method: method.to_string(),
                status: format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown")
                ),
            });
        }

        let body = rsp
            .bytes()
            .await
            .map_err(|err| transport_error(method, err))?;
        let envelope: Response =
            serde_json::from_slice(&body).map_err(|source| ClientError::Protocol {
                method: method.to_string(),
                source,
            })?;

        if envelope.is_err() {
            return Err(ClientError::Rpc(envelope.error));
        }
        Ok(envelope)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("api", &self.api.as_str())
            .field("auth", &self.auth.is_some())
            .finish()
    }
}

fn transport_error(method: &str, err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout {
            method: method.to_string(),
        }
    } else {
        ClientError::Transport {
            method: method.to_string(),
            source: err,
        }
    }
}
