use std::fmt;
use std::time::Duration;

use crate::middleware::Middleware;

/// Command path served when none is configured.
pub const DEFAULT_PATH: &str = "/rpc";
/// Per-client sustained request rate (requests/sec) when none is configured.
pub const DEFAULT_RATE_LIMIT: f64 = 100.0;
/// In-flight request ceiling when none is configured.
pub const DEFAULT_MAX_CONCURRENT: usize = 1000;
/// Largest accepted request body in bytes when none is configured.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Socket and shutdown deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for reading a request's header section.
    pub read_header: Duration,
    /// Deadline for producing and writing one response. On expiry the
    /// connection is dropped without a response.
    pub write: Duration,
    /// Keep-alive deadline between requests on one connection. Shares the
    /// transport's header-read timer with `read_header`; the smaller of the
    /// two applies.
    pub idle: Duration,
    /// How long `shutdown` waits for in-flight requests before giving up on
    /// them.
    pub shutdown_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read_header: Duration::from_secs(5),
            write: Duration::from_secs(10),
            idle: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Identity headers (`App-Name`, `App-Version`, `Author`) stamped on every
/// response that reaches the dispatch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub app_name: String,
    pub author: String,
    pub version: String,
}

/// Basic-auth credentials required on every request when configured.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub passwd: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("passwd", &"***")
            .finish()
    }
}

/// Everything `Server::run` needs besides the method table.
///
/// Built through `Server::builder()`; fields stay public for inspection.
#[derive(Clone)]
pub struct ServerConfig {
    /// Command path; requests anywhere else get 404.
    pub path: String,
    /// Basic-auth requirement, off when `None`.
    pub auth: Option<Credentials>,
    /// Identity headers, off when `None`.
    pub signature: Option<Signature>,
    pub timeouts: Timeouts,
    /// Per-client rate in requests/sec. `None` means [`DEFAULT_RATE_LIMIT`];
    /// an explicit zero or negative rate disables the limiter.
    pub rate_limit: Option<f64>,
    /// In-flight request ceiling. `None` means [`DEFAULT_MAX_CONCURRENT`];
    /// an explicit zero disables the throttle.
    pub max_concurrent: Option<usize>,
    /// Request body size cap in bytes; larger bodies get 413.
    pub max_body_size: usize,
    /// Extra middlewares, first entry outermost.
    pub middlewares: Vec<Middleware>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            auth: None,
            signature: None,
            timeouts: Timeouts::default(),
            rate_limit: None,
            max_concurrent: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            middlewares: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Limiter rate after defaulting, `None` when the limiter is disabled.
    pub(crate) fn effective_rate_limit(&self) -> Option<f64> {
        let rate = self.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT);
        (rate > 0.0).then_some(rate)
    }

    /// Throttle ceiling after defaulting, `None` when the throttle is
    /// disabled.
    pub(crate) fn effective_max_concurrent(&self) -> Option<usize> {
        let max = self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT);
        (max > 0).then_some(max)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("path", &self.path)
            .field("auth", &self.auth)
            .field("signature", &self.signature)
            .field("timeouts", &self.timeouts)
            .field("rate_limit", &self.rate_limit)
            .field("max_concurrent", &self.max_concurrent)
            .field("max_body_size", &self.max_body_size)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
