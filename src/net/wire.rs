/// Backend wire format
///
/// The backend is loose about types: `status` arrives as `200` or `"200"`,
/// profile flags as `0`/`1`, and ids sometimes as numeric strings.
/// Everything is normalised here before it reaches the gallery.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::transport::TransportError;
use crate::state::data::{ImageId, ImageRecord, UserId};

/// Generic `{ status, data, message, errors }` envelope
#[derive(Debug, Deserialize)]
pub struct Reply<T> {
    #[serde(deserialize_with = "loose_int")]
    pub status: i64,
    pub data: Option<T>,
    pub message: Option<Value>,
    pub errors: Option<Value>,
}

impl<T: DeserializeOwned> Reply<T> {
    /// Parse a reply body; absent `data`, `message` or `errors` become None
    pub fn parse(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

impl<T> Reply<T> {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Payload on success, the backend's own message otherwise
    pub fn into_result(self, fallback: &str) -> Result<Option<T>, TransportError> {
        if self.is_success() {
            return Ok(self.data);
        }

        let message = self
            .message
            .as_ref()
            .and_then(error_text)
            .or_else(|| self.errors.as_ref().and_then(error_text))
            .unwrap_or_else(|| fallback.to_string());
        Err(TransportError::rejected(message))
    }
}

fn error_text(errors: &Value) -> Option<String> {
    match errors {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// One image row as sent by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct WireImage {
    #[serde(deserialize_with = "loose_int")]
    pub id: i64,
    pub image_path: String,
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_profile_picture: bool,
    #[serde(default, deserialize_with = "loose_opt_int")]
    pub user_id: Option<i64>,
}

impl WireImage {
    /// Rows without a user id belong to the requesting owner
    pub fn into_record(self, owner: UserId) -> ImageRecord {
        ImageRecord {
            id: ImageId(self.id),
            path: self.image_path,
            is_profile_picture: self.is_profile_picture,
            owner_id: self.user_id.map(UserId).unwrap_or(owner),
        }
    }
}

fn value_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loose_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_int(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {}", value)))
}

fn loose_opt_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_int(&value))
}

fn loose_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let flag = match &value {
        Value::Bool(b) => *b,
        Value::Null => false,
        other => value_to_int(other)
            .map(|n| n != 0)
            .ok_or_else(|| serde::de::Error::custom(format!("expected a flag, got {}", other)))?,
    };
    Ok(flag)
}
