//! Wire types shared by every resource collection.
//!
//! # Design
//! Resource payloads stay schemaless (`serde_json::Value`); the only object
//! the client interprets is `Status`, which the server returns for failures,
//! deletions, and asynchronous operations that are still running. The mock
//! server defines its own copy of this shape; integration tests catch drift.

use serde::{Deserialize, Serialize};

/// Value of the `kind` field that marks a body as a `Status` object.
pub const STATUS_KIND: &str = "Status";

/// Outcome reported by a `Status` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusPhase {
    Success,
    Failure,
    /// The action was accepted and is still running server-side.
    Working,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Extra detail attached to a `Status`. For `Working` statuses `id` names
/// the entry in the `operations` collection to poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Server-reported result of an action that has no resource body of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default)]
    pub status: StatusPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl Status {
    /// Interpret a decoded body as a `Status`, if it declares itself one.
    pub fn from_object(object: &serde_json::Value) -> Option<Status> {
        if object.get("kind").and_then(|k| k.as_str()) != Some(STATUS_KIND) {
            return None;
        }
        serde_json::from_value(object.clone()).ok()
    }

    pub fn is_working(&self) -> bool {
        self.status == StatusPhase::Working
    }

    /// Name of the server-side operation tracking this action.
    pub fn operation_name(&self) -> Option<&str> {
        self.details.as_ref()?.id.as_deref().filter(|id| !id.is_empty())
    }
}
