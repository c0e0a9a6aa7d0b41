use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hyper::StatusCode;
use hyper::header::AUTHORIZATION;
use tracing::warn;

use super::{HttpHandler, HttpRequest};
use crate::config::Credentials;
use crate::handler::text_response;

/// Wrap `next` with basic-auth enforcement; failures are a terminal 401.
///
/// This stage sits outside the rate limiter, so rejected credentials never
/// consume a client's tokens.
pub(crate) fn wrap(next: HttpHandler, creds: Credentials) -> HttpHandler {
    let creds = Arc::new(creds);
    Arc::new(move |req: HttpRequest| {
        let next = Arc::clone(&next);
        let creds = Arc::clone(&creds);
        Box::pin(async move {
            if !authorized(&req, &creds) {
                warn!(path = %req.uri().path(), "basic auth failed");
                return text_response(StatusCode::UNAUTHORIZED, "unauthorized");
            }
            next(req).await
        })
    })
}

fn authorized(req: &HttpRequest, creds: &Credentials) -> bool {
    let Some(header) = req.headers().get(AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = header.to_str() else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(pair) = String::from_utf8(decoded) else {
        return false;
    };
    match pair.split_once(':') {
        Some((user, passwd)) => user == creds.user && passwd == creds.passwd,
        None => false,
    }
}
