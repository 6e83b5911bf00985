//! Encoding between wire payloads and the schemaless object model.

use serde_json::Value;

use crate::error::ApiError;

/// Encodes request objects and decodes response bodies.
///
/// The client never inspects a codec; it is handed to each `Request` and
/// called only by its terminal method.
pub trait Codec: Send + Sync {
    /// Media type advertised in `content-type` and `accept` headers.
    fn content_type(&self) -> &'static str;

    fn encode(&self, object: &Value) -> Result<String, ApiError>;

    /// An empty body decodes to `Value::Null`.
    fn decode(&self, body: &str) -> Result<Value, ApiError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, object: &Value) -> Result<String, ApiError> {
        serde_json::to_string(object).map_err(|e| ApiError::SerializationError(e.to_string()))
    }

    fn decode(&self, body: &str) -> Result<Value, ApiError> {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }
}
