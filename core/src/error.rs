//! Error types for the REST client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." A server that answers with a `Status` object is reported through
//! `Status` so the reason and message survive; any other non-2xx response
//! lands in `HttpError` with the raw status code and body.
//!
//! The polling loop never wraps or rewrites these values: whatever the
//! transport or codec reports is what the caller sees.

use thiserror::Error;

use crate::types::Status;

/// Errors returned by `Client` construction and `Request::execute`.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The base address could not be parsed or cannot carry sub-paths.
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The verb is not a usable HTTP method token.
    #[error("invalid verb {0:?}")]
    InvalidVerb(String),

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server reported a failure through a `Status` object.
    #[error("server returned status {code}: {}", .status.message.as_deref().unwrap_or("no message"))]
    Status { code: u16, status: Status },

    /// The server returned a non-2xx status without a `Status` body.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The transport gave up waiting for the server.
    #[error("request timed out")]
    Timeout,

    /// Connection, DNS, TLS or protocol failure below HTTP semantics.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A final object was requested but the named operation is still running.
    #[error("operation {0:?} has not completed")]
    NotComplete(String),
}
