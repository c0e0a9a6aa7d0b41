use std::sync::Arc;

use hyper::StatusCode;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use super::{HttpHandler, HttpRequest};
use crate::handler::text_response;

/// Server-wide ceiling on concurrently served requests.
///
/// Admission is a non-blocking permit grab; at capacity the request is
/// rejected immediately, nothing queues.
#[derive(Debug, Clone)]
pub(crate) struct Throttle {
    semaphore: Arc<Semaphore>,
}

impl Throttle {
    pub(crate) fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.min(Semaphore::MAX_PERMITS))),
        }
    }

    /// A permit held for the lifetime of one request, or `None` at capacity.
    pub(crate) fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Wrap `next` with the concurrency ceiling; saturation is a terminal 503.
/// The permit is released on every exit path, once the response exists.
pub(crate) fn wrap(next: HttpHandler, throttle: Throttle) -> HttpHandler {
    Arc::new(move |req: HttpRequest| {
        let next = Arc::clone(&next);
        let throttle = throttle.clone();
        Box::pin(async move {
            let Some(_permit) = throttle.try_acquire() else {
                warn!("request throttled, server at capacity");
                return text_response(StatusCode::SERVICE_UNAVAILABLE, "service unavailable");
            };
            next(req).await
        })
    })
}
