//! Request-policy pipeline.
//!
//! The pipeline is composed once, when the server starts serving: each stage
//! wraps the next handler, and the composed result is a plain function from
//! request to response with no per-request lookups. Outermost to innermost
//! the order is fixed: user middlewares (registration order), basic auth,
//! per-client rate limit, concurrency throttle, signature headers, dispatch.
//! A stage that short-circuits produces the final response; no outer stage
//! rewrites an inner stage's response.

pub(crate) mod auth;
pub(crate) mod rate_limit;
pub(crate) mod signature;
pub(crate) mod throttle;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::Full;

/// An HTTP request as the pipeline sees it: body fully read into memory and
/// the transport peer recorded in the extensions as [`PeerAddr`].
pub type HttpRequest = hyper::Request<Bytes>;

/// An HTTP response as the pipeline produces it.
pub type HttpResponse = hyper::Response<Full<Bytes>>;

/// A composed request handler.
pub type HttpHandler = Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, HttpResponse> + Send + Sync>;

/// A middleware turns one handler into another. Middlewares are applied right
/// to left at serve time, so the first middleware in the configured list is
/// the outermost at runtime.
pub type Middleware = Arc<dyn Fn(HttpHandler) -> HttpHandler + Send + Sync>;

/// Transport peer address of the connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// Client identity used for rate limiting: the `X-Real-IP` header when
/// present and non-empty, else the transport peer address.
///
/// The header is trusted unconditionally, so a client able to set it chooses
/// its own bucket. Deployments exposed to untrusted clients should strip the
/// header at the edge.
pub fn client_ip(req: &HttpRequest) -> String {
    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    req.extensions()
        .get::<PeerAddr>()
        .map(|peer| peer.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Wrap `inner` in `middlewares`, right to left.
pub(crate) fn compose(middlewares: &[Middleware], inner: HttpHandler) -> HttpHandler {
    let mut handler = inner;
    for middleware in middlewares.iter().rev() {
        handler = middleware(handler);
    }
    handler
}
