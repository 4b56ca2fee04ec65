#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Shared HTTP DTOs for the Keeplist checklist API.
//!
//! The remote service is not consistent about response envelopes: list
//! endpoints answer with a bare array, `{ "data": [...] }` or
//! `{ "items": [...] }`, and the login endpoint places its token either at the
//! top level or under `data`. The helpers here absorb that variance so the
//! stores only ever see normalised values.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-assigned checklist identifier.
pub type ChecklistId = i64;

/// Server-assigned item identifier, unique within its checklist.
pub type ItemId = i64;

/// Checklist summary as cached by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checklist {
    /// Server-assigned identifier.
    pub id: ChecklistId,
    /// Display name.
    pub name: String,
}

/// Item belonging to a checklist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Server-assigned identifier.
    pub id: ItemId,
    /// Display name.
    #[serde(alias = "itemName")]
    pub name: String,
    /// Completion flag; `true` once the item is done.
    #[serde(default, alias = "itemCompletionStatus")]
    pub status: bool,
}

impl ChecklistItem {
    /// Build a freshly created, not-yet-done item.
    #[must_use]
    pub fn pending(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: false,
        }
    }
}

/// Body for `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Body for `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Requested account name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Requested password.
    pub password: String,
}

/// Body for `POST /checklist`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistCreateRequest {
    /// Name of the new checklist.
    pub name: String,
}

/// Body for `POST /checklist/{id}/item` and the rename endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemNameRequest {
    /// Item name as the server expects it (`itemName`).
    pub item_name: String,
}

/// Body for `PUT /checklist/{id}/item/{itemId}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStatusRequest {
    /// Requested completion flag.
    pub status: bool,
}

/// Error document returned by the service on failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Alternative field some endpoints use instead of `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorMessage {
    /// Extract the most specific message from a raw response body.
    ///
    /// Prefers `message`, then `error`, then a bare JSON string, then the
    /// trimmed body text. Returns `None` when the body carries nothing useful.
    #[must_use]
    pub fn from_body(bytes: &[u8]) -> Option<String> {
        let text = if let Ok(parsed) = serde_json::from_slice::<Self>(bytes) {
            parsed.message.or(parsed.error)?
        } else if let Ok(text) = serde_json::from_slice::<String>(bytes) {
            text
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// Locate the array inside a list response envelope.
///
/// Accepts a bare array, an array under `data`, or an array under `items`.
/// Anything else yields `None`.
#[must_use]
pub fn list_payload(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(entries) => Some(entries),
        Value::Object(mut map) => {
            for key in ["data", "items"] {
                if let Some(Value::Array(entries)) = map.remove(key) {
                    return Some(entries);
                }
            }
            None
        }
        _ => None,
    }
}

/// Normalise a list response into typed entries.
///
/// Non-array payloads degrade to an empty list. Entries that fail to decode
/// are skipped with a warning so one bad row cannot hide the rest.
#[must_use]
pub fn normalize_list<T: DeserializeOwned>(value: Value, resource: &str) -> Vec<T> {
    let Some(entries) = list_payload(value) else {
        tracing::warn!(resource, "unexpected list response shape; using empty list");
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(resource, error = %err, "discarding malformed list entry");
                None
            }
        })
        .collect()
}

/// Pull the bearer token out of a login response.
///
/// The token may live under `data.token` or at the top level; `data.token`
/// wins when both are present. Blank tokens count as missing.
#[must_use]
pub fn extract_token(value: &Value) -> Option<String> {
    value
        .get("data")
        .and_then(|data| data.get("token"))
        .and_then(Value::as_str)
        .filter(|token| !token.trim().is_empty())
        .or_else(|| {
            value
                .get("token")
                .and_then(Value::as_str)
                .filter(|token| !token.trim().is_empty())
        })
        .map(str::to_string)
}

/// Pull the server-assigned id out of a create response.
///
/// Looks at `id` first, then `data.id`; numeric strings are accepted.
#[must_use]
pub fn extract_id(value: &Value) -> Option<i64> {
    value
        .get("id")
        .and_then(id_from_value)
        .or_else(|| value.get("data").and_then(|data| data.get("id")).and_then(id_from_value))
}

fn id_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
