//! HTTP client for courier RPC endpoints.
//!
//! A [`Client`] serialises calls into request envelopes, POSTs them to one
//! configured endpoint and hands back the response envelope. Request ids are
//! a per-client sequence starting at 1, so responses correlate with calls.
//! Params travel verbatim: the shape you pass is the shape on the wire.
//!
//! ```no_run
//! use courier_client::Client;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder("http://127.0.0.1:8080/rpc")
//!     .auth("user", "passwd")
//!     .build()?;
//!
//! let saved = client.call("store.save", ("hello world",)).await?;
//! let record_id: String = saved.decode()?;
//! # Ok(())
//! # }
//! ```
//!
//! Every failure of a call is a single [`ClientError`]: rejected statuses
//! keep their status line (`bad status 401 Unauthorized for <method>`),
//! handler-reported failures carry the handler's message verbatim.

pub mod client;
pub mod error;

pub use client::{Client, ClientBuilder, DEFAULT_TIMEOUT};
pub use error::ClientError;

// Re-exported so callers decode results without depending on courier-rpc.
pub use courier_rpc::{EnvelopeError, Request, Response};
