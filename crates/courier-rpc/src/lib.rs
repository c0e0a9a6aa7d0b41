//! Transport-agnostic core of the courier RPC framework.
//!
//! The protocol is a deliberately small request/response pairing over JSON:
//! a [`Request`] names a method, carries opaque params and a correlation id,
//! and a [`Response`] echoes the id back with either a result payload or an
//! error message. Payloads travel as raw JSON ([`serde_json::value::RawValue`])
//! so the framework never interprets what handlers exchange.
//!
//! Method implementations are [`Handler`]s collected in a [`Registry`], either
//! under bare names or grouped under a `"<group>.<name>"` prefix via
//! [`HandlerGroup`]. The registry routes one request to exactly one handler:
//!
//! ```
//! use courier_rpc::{Params, Registry, Request, Response};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut registry = Registry::new();
//! registry.add("ping", |id: u64, _params: Params| async move {
//!     Response::ok(id, &"pong")
//! });
//!
//! let response = registry.dispatch(Request::new("ping", 1)).await.unwrap();
//! assert_eq!(response.decode::<String>().unwrap(), "pong");
//! # }
//! ```
//!
//! HTTP transport lives in `courier-server` and `courier-client`; this crate
//! has no opinion on how envelopes move.

pub mod error;
pub mod handler;
pub mod registry;
pub mod request;
pub mod response;

pub use error::{DispatchError, EnvelopeError};
pub use handler::{Handler, HandlerGroup, Params, decode_params};
pub use registry::Registry;
pub use request::Request;
pub use response::Response;
