//! HTTP transport for courier RPC servers.
//!
//! A [`Server`] owns a method registry and serves it on one command path over
//! plain HTTP POST. Every request passes a fixed policy pipeline before
//! dispatch: optional user middlewares, optional basic auth (401), a
//! per-client token-bucket rate limit (429), a server-wide concurrency
//! throttle (503) and optional signature headers. Handler results always ride
//! an HTTP 200 envelope; only the policy stages and routing speak through
//! status codes.
//!
//! ```no_run
//! use courier_server::{Params, Response, Server};
//!
//! async fn ping(id: u64, _params: Params) -> Response {
//!     Response::ok(id, &"pong")
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), courier_server::ServerError> {
//!     let server = Server::builder().auth("user", "passwd").build();
//!     server.add("ping", ping);
//!     server.run(8080).await
//! }
//! ```
//!
//! `run` blocks for the server's whole life; call
//! [`shutdown`](Server::shutdown) from another task to end it. Lifecycle is
//! strictly one-way: not started, serving, shutting down, stopped.

use thiserror::Error;

pub mod config;
pub(crate) mod handler;
pub mod middleware;
pub mod server;

pub use config::{
    Credentials, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_CONCURRENT, DEFAULT_PATH, DEFAULT_RATE_LIMIT,
    ServerConfig, Signature, Timeouts,
};
pub use middleware::{HttpHandler, HttpRequest, HttpResponse, Middleware, PeerAddr, client_ip};
pub use server::{Lifecycle, Server, ServerBuilder};

// Protocol types, re-exported so simple servers need a single dependency.
pub use courier_rpc::{
    DispatchError, Handler, HandlerGroup, Params, Registry, Request, Response, decode_params,
};

/// Configuration and lifecycle failures surfaced by [`Server`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// `run` called with an empty method table.
    #[error("nothing registered for dispatch, register methods before run")]
    EmptyRegistry,
    /// `run` called on a server that has already run.
    #[error("server already started")]
    AlreadyStarted,
    /// `shutdown` called while the server is not serving.
    #[error("server is not running")]
    NotRunning,
    /// Transport failure while binding or accepting.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
