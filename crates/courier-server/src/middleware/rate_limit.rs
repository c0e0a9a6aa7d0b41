use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use hyper::StatusCode;
use parking_lot::Mutex;
use tracing::warn;

use super::{HttpHandler, HttpRequest, client_ip};
use crate::handler::text_response;

/// One client's bucket: available tokens and the instant they were last
/// topped up.
#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter keyed by client identity.
///
/// Every key gets its own bucket holding up to `capacity` tokens, refilled
/// continuously at `rate` tokens/sec; capacity equals the rate, giving one
/// second of burst, floored at one token so rates below 1/sec still admit a
/// request once enough time has passed. Buckets are created on first sight
/// and never evicted, so the map grows with the number of distinct client
/// addresses seen.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    rate: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, Arc<Mutex<Bucket>>>>,
}

impl RateLimiter {
    /// `rate` is requests/sec and must be positive; non-positive rates mean
    /// the limiter is not constructed at all.
    pub(crate) fn new(rate: f64) -> Self {
        Self {
            rate,
            capacity: rate.max(1.0),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `key`; `false` means over the limit.
    ///
    /// The map lock is held only to fetch or create the bucket. Refill
    /// arithmetic runs under the per-bucket lock, so concurrent requests for
    /// one key settle on a consistent token count and requests for different
    /// keys never contend.
    pub(crate) fn allow(&self, key: &str) -> bool {
        let bucket = {
            let mut buckets = self.buckets.lock();
            match buckets.get(key) {
                Some(bucket) => Arc::clone(bucket),
                None => {
                    let bucket = Arc::new(Mutex::new(Bucket {
                        tokens: self.capacity,
                        last_refill: Instant::now(),
                    }));
                    buckets.insert(key.to_string(), Arc::clone(&bucket));
                    bucket
                }
            }
        };

        let mut bucket = bucket.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Wrap `next` with the per-client limit; rejections are a terminal 429 and
/// never reach the throttle or a handler.
pub(crate) fn wrap(next: HttpHandler, limiter: Arc<RateLimiter>) -> HttpHandler {
    Arc::new(move |req: HttpRequest| {
        let next = Arc::clone(&next);
        let limiter = Arc::clone(&limiter);
        Box::pin(async move {
            let key = client_ip(&req);
            if !limiter.allow(&key) {
                warn!(client = %key, "rate limit exceeded");
                return text_response(StatusCode::TOO_MANY_REQUESTS, "too many requests");
            }
            next(req).await
        })
    })
}
