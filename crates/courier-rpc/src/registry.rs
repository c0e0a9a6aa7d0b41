use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::DispatchError;
use crate::handler::{Handler, HandlerGroup};
use crate::{Request, Response};

/// Method table mapping names to handlers.
///
/// Cloning is cheap: handlers are shared behind `Arc`, so a clone is a flat
/// copy of the name map. The server relies on this to snapshot the table when
/// it starts serving.
#[derive(Clone, Default)]
pub struct Registry {
    methods: HashMap<String, Arc<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`, replacing any previous registration.
    pub fn add<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        self.methods.insert(method.into(), Arc::new(handler));
    }

    /// Register every member of `group` under `"<prefix>.<name>"`.
    pub fn group(&mut self, prefix: &str, group: HandlerGroup) {
        for (name, handler) in group.handlers {
            self.methods.insert(format!("{prefix}.{name}"), handler);
        }
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Registered method names, in no particular order.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Route `request` to its handler and return the handler's envelope.
    ///
    /// Exactly one handler runs for a known method. Unknown names fail
    /// without side effects, and the empty name fails without a lookup.
    pub async fn dispatch(&self, request: Request) -> Result<Response, DispatchError> {
        if request.method.is_empty() {
            return Err(DispatchError::MethodNotFound(request.method));
        }
        let handler = self
            .methods
            .get(&request.method)
            .ok_or_else(|| DispatchError::MethodNotFound(request.method.clone()))?;
        debug!(method = %request.method, id = request.id, "dispatching request");
        Ok(handler.handle(request.id, request.params).await)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
