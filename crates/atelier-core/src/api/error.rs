//! Remote service error taxonomy
//!
//! Classifies every remote failure into the categories the sync engine
//! bases its cache decisions on: auth errors clear local state, 404 on
//! delete is already-satisfied, rate limits surface a wait duration,
//! validation errors surface field-by-field, everything else is
//! transient and preserves last-known-good state.

use thiserror::Error;

/// A single field rejected by server-side validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Errors returned by the remote artwork service
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Session token missing or invalidated (401)
    #[error("authentication required, sign in again")]
    Unauthorized,

    /// Authenticated but not allowed (403)
    #[error("you do not have permission to do that")]
    Forbidden,

    /// The record does not exist server-side (404)
    #[error("artwork not found")]
    NotFound,

    /// Too many requests (429); `wait` is human-readable when the
    /// server provided a duration
    #[error("too many requests, try again {}", .wait.as_deref().unwrap_or("later"))]
    RateLimited { wait: Option<String> },

    /// The payload was rejected (400)
    #[error("validation failed: {}", format_fields(.fields))]
    Validation { fields: Vec<FieldError> },

    /// Network failure, 5xx, or cancelled request; safe to retry
    #[error("request failed: {0}")]
    Transient(String),
}

impl ApiError {
    /// Classify an HTTP response into the taxonomy
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound,
            429 => ApiError::RateLimited {
                wait: extract_wait(body),
            },
            400 => ApiError::Validation {
                fields: extract_fields(body),
            },
            other => ApiError::Transient(format!("server returned status {}", other)),
        }
    }

    /// True for 401/403: the session is not considered to have valid data
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::Forbidden)
    }

    /// True when a manual retry may succeed without any state change
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Transient("request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Transient(format!("could not reach server: {}", err))
        } else {
            ApiError::Transient(err.to_string())
        }
    }
}

/// Result type for remote service operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Pull a human-readable wait duration out of a 429 body, if present
fn extract_wait(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(secs) = value.get("retryAfterSecs").and_then(|v| v.as_u64()) {
        return Some(format!("in {} seconds", secs));
    }
    value
        .get("retryAfter")
        .and_then(|v| v.as_str())
        .map(|s| format!("in {}", s))
}

/// Pull per-field messages out of a 400 body
///
/// Expected shape: `{"errors": {"title": "is required", ...}}`. A body
/// without that shape yields a single catch-all field entry when a
/// message is present, or none at all.
fn extract_fields(body: &str) -> Vec<FieldError> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Vec::new();
    };

    if let Some(errors) = value.get("errors").and_then(|v| v.as_object()) {
        let mut fields: Vec<FieldError> = errors
            .iter()
            .filter_map(|(field, msg)| {
                msg.as_str().map(|m| FieldError {
                    field: field.clone(),
                    message: m.to_string(),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        return fields;
    }

    value
        .get("message")
        .and_then(|v| v.as_str())
        .map(|m| {
            vec![FieldError {
                field: "payload".to_string(),
                message: m.to_string(),
            }]
        })
        .unwrap_or_default()
}

fn format_fields(fields: &[FieldError]) -> String {
    if fields.is_empty() {
        return "invalid payload".to_string();
    }
    fields
        .iter()
        .map(|f| format!("{} {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}
