// ============================
// crates/backend-lib/src/validation.rs
// ============================
//! Inbound payload validation.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_ROOM_ID_LENGTH: usize = 64;

/// Maximum chat message length in characters, after trimming.
pub const MAX_CHAT_LENGTH: usize = 1000;

static ROOM_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid room ID: {0}")]
    InvalidRoomId(String),

    #[error("Message too long: {0} characters (max {MAX_CHAT_LENGTH})")]
    MessageTooLong(usize),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a room ID: non-empty, bounded, url-safe characters only.
pub fn validate_room_id(room_id: &str) -> ValidationResult<&str> {
    if room_id.is_empty() || room_id.len() > MAX_ROOM_ID_LENGTH {
        return Err(ValidationError::InvalidRoomId(format!(
            "must be 1-{MAX_ROOM_ID_LENGTH} characters"
        )));
    }
    if !ROOM_ID_REGEX.is_match(room_id) {
        return Err(ValidationError::InvalidRoomId(
            "only letters, digits, '-' and '_' are allowed".to_string(),
        ));
    }
    Ok(room_id)
}

/// Validate chat text. Returns the trimmed text; `Ok(None)` means the
/// message was whitespace-only and must be dropped without any error.
pub fn validate_chat_text(text: &str) -> ValidationResult<Option<&str>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let len = trimmed.chars().count();
    if len > MAX_CHAT_LENGTH {
        return Err(ValidationError::MessageTooLong(len));
    }
    Ok(Some(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_accepts_url_safe() {
        assert!(validate_room_id("room-42").is_ok());
        assert!(validate_room_id("Lesson_3").is_ok());
    }

    #[test]
    fn test_room_id_rejects_bad_input() {
        assert!(validate_room_id("").is_err());
        assert!(validate_room_id("room 42").is_err());
        assert!(validate_room_id("room/42").is_err());
        assert!(validate_room_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_chat_text_trims() {
        assert_eq!(validate_chat_text("  hello  ").unwrap(), Some("hello"));
    }

    #[test]
    fn test_chat_text_whitespace_only_is_dropped() {
        assert_eq!(validate_chat_text("   ").unwrap(), None);
        assert_eq!(validate_chat_text("").unwrap(), None);
    }

    #[test]
    fn test_chat_text_length_ceiling() {
        let max = "x".repeat(MAX_CHAT_LENGTH);
        assert!(validate_chat_text(&max).unwrap().is_some());

        let over = "x".repeat(MAX_CHAT_LENGTH + 1);
        assert!(matches!(
            validate_chat_text(&over),
            Err(ValidationError::MessageTooLong(_))
        ));
    }
}
