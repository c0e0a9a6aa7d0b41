use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use hyper::{Method, StatusCode};
use tracing::{debug, warn};

use courier_rpc::{Registry, Request, Response};

use crate::middleware::{HttpHandler, HttpRequest, HttpResponse};

/// Innermost stage of the pipeline: route, decode, dispatch, encode.
///
/// Everything the registry reports rides the HTTP layer as follows: a found
/// handler's envelope is 200 whatever the envelope says, an unknown method is
/// 501, an undecodable body is 500. Wrong path and wrong verb never reach the
/// registry (404 and 405).
///
/// Requests that do not assert an id get one assigned server-side from a
/// sequence starting at 1, so their responses still correlate.
pub(crate) fn dispatch_handler(registry: Arc<Registry>, path: Arc<str>) -> HttpHandler {
    let seq = Arc::new(AtomicU64::new(0));
    Arc::new(move |req: HttpRequest| {
        let registry = Arc::clone(&registry);
        let path = Arc::clone(&path);
        let seq = Arc::clone(&seq);
        Box::pin(async move { dispatch(registry, path, seq, req).await })
    })
}

async fn dispatch(
    registry: Arc<Registry>,
    path: Arc<str>,
    seq: Arc<AtomicU64>,
    req: HttpRequest,
) -> HttpResponse {
    if req.uri().path() != path.as_ref() {
        return text_response(StatusCode::NOT_FOUND, "not found");
    }
    if req.method() != Method::POST {
        let mut rsp = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        rsp.headers_mut().insert(ALLOW, HeaderValue::from_static("POST"));
        return rsp;
    }

    let mut request: Request = match serde_json::from_slice(req.body()) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed request body");
            return text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("can't parse request: {err}"),
            );
        }
    };
    if request.id == 0 {
        request.id = seq.fetch_add(1, Ordering::Relaxed) + 1;
    }

    match registry.dispatch(request).await {
        Ok(response) => envelope_response(&response),
        Err(err) => {
            debug!(error = %err, "dispatch refused");
            text_response(StatusCode::NOT_IMPLEMENTED, err.to_string())
        }
    }
}

/// Encode an envelope as the HTTP 200 response body. Envelope bodies are
/// newline-terminated JSON.
fn envelope_response(response: &Response) -> HttpResponse {
    match serde_json::to_vec(response) {
        Ok(mut body) => {
            body.push(b'\n');
            hyper::Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(body)))
                .unwrap()
        }
        Err(err) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("can't encode response: {err}"),
        ),
    }
}

/// Plain-text response used for everything that is not an envelope.
pub(crate) fn text_response(status: StatusCode, body: impl Into<String>) -> HttpResponse {
    hyper::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.into())))
        .unwrap()
}
