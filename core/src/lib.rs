//! Generic REST client with asynchronous-operation polling.
//!
//! # Overview
//! `Client` holds connection-level settings and hands out one `Request`
//! builder per call. A request's `execute` performs the HTTP exchange and,
//! when the server reports that an action is still running, follows the
//! server's `operations/<name>` resource until it completes or the poller
//! gives up.
//!
//! # Design
//! - Payloads are schemaless `serde_json::Value`s; only `Status` objects
//!   are interpreted.
//! - The network sits behind `HttpClient`, taking and returning plain-data
//!   `HttpRequest` / `HttpResponse` values. `UreqTransport` is the default.
//! - Polling is strictly sequential and blocking: one request of a chain is
//!   in flight at a time, and the built-in poller sleeps on the calling
//!   thread between checks.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{Client, DEFAULT_POLL_PERIOD, OPERATIONS_RESOURCE};
pub use codec::{Codec, JsonCodec};
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use request::{Outcome, PollFn, Request};
pub use transport::UreqTransport;
pub use types::{Status, StatusDetails, StatusPhase};
