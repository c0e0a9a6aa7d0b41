use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_rpc::{Handler, HandlerGroup, Registry};

use crate::ServerError;
use crate::config::{Credentials, ServerConfig, Signature, Timeouts};
use crate::handler::{dispatch_handler, text_response};
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::throttle::Throttle;
use crate::middleware::{self, HttpHandler, HttpResponse, PeerAddr};

/// Where a server is in its one-way life. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    NotStarted,
    Serving,
    ShuttingDown,
    Stopped,
}

/// Builder for [`Server`]; all knobs are optional.
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command path served; requests anywhere else get 404. Default `/rpc`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Require basic auth with these credentials on every request.
    pub fn auth(mut self, user: impl Into<String>, passwd: impl Into<String>) -> Self {
        self.config.auth = Some(Credentials {
            user: user.into(),
            passwd: passwd.into(),
        });
        self
    }

    /// Stamp `App-Name`, `App-Version` and `Author` headers on every
    /// dispatched response.
    pub fn signature(
        mut self,
        app_name: impl Into<String>,
        author: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.config.signature = Some(Signature {
            app_name: app_name.into(),
            author: author.into(),
            version: version.into(),
        });
        self
    }

    /// Replace the default socket and shutdown deadlines.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Sustained per-client request rate in requests/sec, with an equal
    /// burst (floored at one request). Unset defaults to 100; zero or
    /// negative disables the limiter.
    pub fn rate_limit(mut self, rate: f64) -> Self {
        self.config.rate_limit = Some(rate);
        self
    }

    /// Ceiling on concurrently served requests. Unset defaults to 1000; zero
    /// disables the throttle.
    pub fn throttle(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = Some(max_concurrent);
        self
    }

    /// Largest accepted request body in bytes. Default 1 MiB.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Append a middleware. The first appended runs outermost, around the
    /// whole policy pipeline.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use courier_server::{HttpHandler, Server};
    ///
    /// let server = Server::builder()
    ///     .middleware(|next: HttpHandler| -> HttpHandler {
    ///         Arc::new(move |req| {
    ///             let next = Arc::clone(&next);
    ///             Box::pin(async move {
    ///                 let mut rsp = next(req).await;
    ///                 rsp.headers_mut().insert("x-served-by", "courier".parse().unwrap());
    ///                 rsp
    ///             })
    ///         })
    ///     })
    ///     .build();
    /// ```
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Fn(HttpHandler) -> HttpHandler + Send + Sync + 'static,
    {
        self.config.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Server {
        let (state, _) = watch::channel(Lifecycle::NotStarted);
        Server {
            config: self.config,
            registry: Mutex::new(Registry::new()),
            state,
            stop: CancellationToken::new(),
            local_addr: Mutex::new(None),
        }
    }
}

/// An RPC server: a method registry behind one HTTP endpoint with a fixed
/// policy pipeline (auth, per-client rate limit, concurrency throttle,
/// signature headers) around dispatch.
///
/// Register methods, then [`run`](Server::run); `run` blocks for the server's
/// whole life and a concurrent [`shutdown`](Server::shutdown) ends it.
pub struct Server {
    config: ServerConfig,
    registry: Mutex<Registry>,
    state: watch::Sender<Lifecycle>,
    stop: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Register a method, replacing any previous handler of the same name.
    ///
    /// Once the server has started, registrations are ignored with a debug
    /// log: the serving method set is the one present at `run`.
    pub fn add<H>(&self, method: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        let method = method.into();
        let mut registry = self.registry.lock();
        if self.state() != Lifecycle::NotStarted {
            debug!(method = %method, "registration after start ignored");
            return;
        }
        registry.add(method, handler);
    }

    /// Register a group of methods under `"<prefix>.<name>"`. Subject to the
    /// same after-start rule as [`add`](Server::add).
    pub fn group(&self, prefix: &str, group: HandlerGroup) {
        let mut registry = self.registry.lock();
        if self.state() != Lifecycle::NotStarted {
            debug!(prefix = %prefix, "registration after start ignored");
            return;
        }
        registry.group(prefix, group);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        *self.state.borrow()
    }

    /// Configuration this server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Address actually bound, set once `run` has its listener. With port 0
    /// this is where the ephemeral port shows up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Serve on `0.0.0.0:<port>` until [`shutdown`](Server::shutdown).
    ///
    /// Fails fast when no methods are registered or when the server has
    /// already been started. Otherwise blocks for the server's whole life:
    /// `Ok(())` after a clean shutdown and drain, the transport error that
    /// ended serving early otherwise.
    pub async fn run(&self, port: u16) -> Result<(), ServerError> {
        let registry = {
            let registry = self.registry.lock();
            if registry.is_empty() {
                return Err(ServerError::EmptyRegistry);
            }
            // transition while holding the registry lock: a racing `add`
            // either lands in this snapshot or observes `Serving`
            if !self.transition(Lifecycle::NotStarted, Lifecycle::Serving) {
                return Err(ServerError::AlreadyStarted);
            }
            Arc::new(registry.clone())
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                self.state.send_replace(Lifecycle::Stopped);
                return Err(err.into());
            }
        };
        let local = match listener.local_addr() {
            Ok(local) => local,
            Err(err) => {
                self.state.send_replace(Lifecycle::Stopped);
                return Err(err.into());
            }
        };
        *self.local_addr.lock() = Some(local);

        let method_count = registry.len();
        let chain = self.compose_chain(registry);
        let graceful = GracefulShutdown::new();
        let timeouts = self.config.timeouts;
        let header_read = timeouts.read_header.min(timeouts.idle);
        let max_body = self.config.max_body_size;

        info!(addr = %local, path = %self.config.path, methods = method_count, "rpc server listening");

        let result = loop {
            tokio::select! {
                _ = self.stop.cancelled() => break Ok(()),
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            error!(error = %err, "accept failed");
                            break Err(ServerError::Io(err));
                        }
                    };
                    let conn_chain = Arc::clone(&chain);
                    let service = service_fn(move |req: hyper::Request<Incoming>| {
                        let chain = Arc::clone(&conn_chain);
                        serve_request(chain, req, peer, timeouts.write, max_body)
                    });
                    let conn = http1::Builder::new()
                        .timer(TokioTimer::new())
                        .header_read_timeout(header_read)
                        .serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);
                    tokio::spawn(async move {
                        if let Err(err) = conn.await {
                            debug!(peer = %peer, error = %err, "connection closed with error");
                        }
                    });
                }
            }
        };

        drop(listener);
        if result.is_ok() {
            tokio::select! {
                _ = graceful.shutdown() => debug!("connections drained"),
                _ = tokio::time::sleep(timeouts.shutdown_grace) => {
                    warn!(grace = ?timeouts.shutdown_grace, "grace period expired with connections still active");
                }
            }
        }
        self.state.send_replace(Lifecycle::Stopped);
        info!("rpc server stopped");
        result
    }

    /// Stop accepting, drain in-flight requests within the grace period and
    /// wait for [`run`](Server::run) to return.
    ///
    /// Errors with [`ServerError::NotRunning`] in any state but `Serving`,
    /// including on a second call.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        if !self.transition(Lifecycle::Serving, Lifecycle::ShuttingDown) {
            return Err(ServerError::NotRunning);
        }
        info!("shutdown requested");
        self.stop.cancel();

        let mut state = self.state.subscribe();
        while *state.borrow_and_update() != Lifecycle::Stopped {
            if state.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    }

    fn transition(&self, from: Lifecycle, to: Lifecycle) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Build the serve-time pipeline, innermost stage first.
    fn compose_chain(&self, registry: Arc<Registry>) -> HttpHandler {
        let path: Arc<str> = Arc::from(self.config.path.as_str());
        let mut handler = dispatch_handler(registry, path);
        if let Some(signature) = &self.config.signature {
            handler = middleware::signature::wrap(handler, signature);
        }
        if let Some(max_concurrent) = self.config.effective_max_concurrent() {
            handler = middleware::throttle::wrap(handler, Throttle::new(max_concurrent));
        }
        if let Some(rate) = self.config.effective_rate_limit() {
            handler = middleware::rate_limit::wrap(handler, Arc::new(RateLimiter::new(rate)));
        }
        if let Some(creds) = &self.config.auth {
            handler = middleware::auth::wrap(handler, creds.clone());
        }
        middleware::compose(&self.config.middlewares, handler)
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("path", &self.config.path)
            .field("state", &self.state())
            .field("methods", &self.registry.lock().len())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Per-request service body: read the capped body, note the peer, run the
/// pipeline under the write deadline.
///
/// Returning `Err` makes the transport drop the connection, which is exactly
/// what an expired write deadline calls for.
async fn serve_request(
    chain: HttpHandler,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
    write_timeout: Duration,
    max_body: usize,
) -> Result<HttpResponse, std::io::Error> {
    let (parts, body) = req.into_parts();
    let body = http_body_util::Limited::new(body, max_body);
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let rsp = if err.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                warn!(peer = %peer, "request body over the size cap");
                text_response(StatusCode::PAYLOAD_TOO_LARGE, "payload too large")
            } else {
                warn!(peer = %peer, error = %err, "failed reading request body");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "can't read request")
            };
            return Ok(rsp);
        }
    };

    let mut req = hyper::Request::from_parts(parts, bytes);
    req.extensions_mut().insert(PeerAddr(peer));

    match tokio::time::timeout(write_timeout, chain(req)).await {
        Ok(rsp) => Ok(rsp),
        Err(_) => {
            warn!(peer = %peer, "write deadline expired, dropping connection");
            Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "response not produced within the write deadline",
            ))
        }
    }
}
