use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::Response;

/// Raw argument payload as delivered to handlers.
pub type Params = Option<Box<RawValue>>;

/// A registered method implementation.
///
/// Any `async fn(u64, Params) -> Response` (or a closure with that exact
/// signature) implements this trait through the blanket impl below, so plain
/// functions register directly; implement the trait by hand only when the
/// handler carries its own state.
///
/// ```
/// use courier_rpc::{Params, Registry, Response, decode_params};
///
/// async fn multiply(id: u64, params: Params) -> Response {
///     match decode_params::<(i64, i64)>(params.as_deref()) {
///         Ok((a, b)) => Response::ok(id, &(a * b)),
///         Err(err) => Response::err(id, err.to_string()),
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.add("multiply", multiply);
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, id: u64, params: Params) -> Response;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(u64, Params) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send,
{
    async fn handle(&self, id: u64, params: Params) -> Response {
        self(id, params).await
    }
}

/// Decode a request's raw params into a concrete argument type.
///
/// Absent params decode as JSON `null`, so handlers taking `Option<T>` accept
/// param-less calls without a special case.
pub fn decode_params<T: DeserializeOwned>(params: Option<&RawValue>) -> Result<T, serde_json::Error> {
    match params {
        Some(raw) => serde_json::from_str(raw.get()),
        None => serde_json::from_str("null"),
    }
}

/// Named handlers registered together under a common prefix.
///
/// Passed to `Registry::group` (or the server's `group`), every member
/// becomes callable as `"<prefix>.<name>"`.
#[derive(Default)]
pub struct HandlerGroup {
    pub(crate) handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler under its short name, replacing any previous one.
    pub fn add<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl std::fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
