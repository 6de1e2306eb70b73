//! Message and room-name validation.
//!
//! Validation is pure: nothing here touches shared state.

use serde_json::Value;
use thiserror::Error;

/// Maximum message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Maximum room name length in characters.
pub const MAX_ROOM_NAME_CHARS: usize = 64;

/// Why a message was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No payload at all.
    #[error("message is empty")]
    Missing,

    /// Payload is not a string.
    #[error("message must be text")]
    NotText,

    /// Payload is whitespace only.
    #[error("message is blank")]
    Blank,

    /// Payload exceeds the character limit.
    #[error("message is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Validate a message payload with the default length limit.
///
/// # Errors
///
/// Returns the first rule the payload breaks.
pub fn validate(payload: Option<&Value>) -> Result<&str, Rejection> {
    validate_with_limit(payload, MAX_MESSAGE_CHARS)
}

/// Validate a message payload.
///
/// Rules, in order: present, textual, non-blank after trimming, at most
/// `max_chars` characters. The returned text is the payload as sent.
///
/// # Errors
///
/// Returns the first rule the payload breaks.
pub fn validate_with_limit(payload: Option<&Value>, max_chars: usize) -> Result<&str, Rejection> {
    let text = match payload {
        None | Some(Value::Null) => return Err(Rejection::Missing),
        Some(Value::String(text)) => text.as_str(),
        Some(_) => return Err(Rejection::NotText),
    };

    if text.trim().is_empty() {
        return Err(Rejection::Blank);
    }

    let len = text.chars().count();
    if len > max_chars {
        return Err(Rejection::TooLong {
            len,
            max: max_chars,
        });
    }

    Ok(text)
}

/// Validate a room name and return it trimmed.
///
/// # Errors
///
/// Returns an error message if the room name is invalid.
pub fn validate_room_name(name: &str, max_chars: usize) -> Result<&str, &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("room name cannot be empty");
    }
    if name.chars().count() > max_chars {
        return Err("room name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("room name contains invalid characters");
    }
    Ok(name)
}
