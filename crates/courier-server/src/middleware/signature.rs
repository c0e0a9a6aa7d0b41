use std::sync::Arc;

use hyper::header::{HeaderName, HeaderValue};
use tracing::warn;

use super::{HttpHandler, HttpRequest};
use crate::config::Signature;

/// Wrap `next` so every response it produces carries the identity headers
/// `App-Name`, `App-Version` and `Author`.
///
/// Sitting just outside dispatch, this stamps success envelopes, handler
/// error envelopes and 501s alike; policy rejections terminate in outer
/// stages and stay unstamped.
pub(crate) fn wrap(next: HttpHandler, signature: &Signature) -> HttpHandler {
    let headers: Arc<Vec<(HeaderName, HeaderValue)>> = Arc::new(
        [
            ("app-name", signature.app_name.as_str()),
            ("app-version", signature.version.as_str()),
            ("author", signature.author.as_str()),
        ]
        .into_iter()
        .filter_map(|(name, value)| match HeaderValue::from_str(value) {
            Ok(value) => Some((HeaderName::from_static(name), value)),
            Err(_) => {
                warn!(header = name, "signature value not a valid header, skipped");
                None
            }
        })
        .collect(),
    );

    Arc::new(move |req: HttpRequest| {
        let next = Arc::clone(&next);
        let headers = Arc::clone(&headers);
        Box::pin(async move {
            let mut rsp = next(req).await;
            for (name, value) in headers.iter() {
                rsp.headers_mut().insert(name.clone(), value.clone());
            }
            rsp
        })
    })
}
