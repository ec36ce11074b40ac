//! Boundary checks for user-supplied strings.
//!
//! Serde already guarantees every field exists and has the right type;
//! these functions check content.

use pighouse_protocol::RoomId;

/// Maximum player or spectator name length, in characters.
pub const MAX_NAME_CHARS: usize = 20;
/// Maximum room password length, in characters.
pub const MAX_PASSWORD_CHARS: usize = 20;
/// Maximum chat message length, in characters.
pub const MAX_CHAT_CHARS: usize = 100;

/// Names may not contain these (case-insensitive), so nobody can pose as
/// staff.
const FORBIDDEN_WORDS: &[&str] = &["admin", "system", "server", "moderator"];

/// Content that failed a boundary check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must be 1 to {MAX_NAME_CHARS} characters")]
    NameLength,

    #[error("name may only contain letters, digits, spaces, '_' and '-'")]
    NameCharacters,

    #[error("that name is not allowed")]
    NameForbidden,

    #[error("room code must be 3 to 10 letters or digits")]
    RoomId,

    #[error("password must be 1 to {MAX_PASSWORD_CHARS} characters")]
    Password,

    #[error("message must be 1 to {MAX_CHAT_CHARS} characters")]
    ChatLength,

    #[error("you are not in a room")]
    NotInRoom,

    #[error("only seated players can chat")]
    NotSeated,
}

/// Trims and checks a display name.
pub fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(ValidationError::NameLength);
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-')
    {
        return Err(ValidationError::NameCharacters);
    }
    let lowered = name.to_lowercase();
    if FORBIDDEN_WORDS.iter().any(|w| lowered.contains(w)) {
        return Err(ValidationError::NameForbidden);
    }
    Ok(name.to_string())
}

/// Uppercases and checks a room code typed by a user.
pub fn normalize_room_id(raw: &str) -> Result<RoomId, ValidationError> {
    let code = raw.trim().to_ascii_uppercase();
    if !(3..=10).contains(&code.len()) || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::RoomId);
    }
    Ok(RoomId(code))
}

/// The password a new room is created with, or `None` for an open room.
pub fn room_password(has_password: bool, raw: &str) -> Result<Option<String>, ValidationError> {
    if !has_password {
        return Ok(None);
    }
    check_password(raw)?;
    Ok(Some(raw.to_string()))
}

/// A password offered when joining. Empty is allowed (open rooms).
pub fn join_password(raw: &str) -> Result<&str, ValidationError> {
    if raw.is_empty() {
        return Ok(raw);
    }
    check_password(raw)?;
    Ok(raw)
}

fn check_password(raw: &str) -> Result<(), ValidationError> {
    let len = raw.chars().count();
    if len == 0 || len > MAX_PASSWORD_CHARS || raw.chars().any(char::is_control) {
        return Err(ValidationError::Password);
    }
    Ok(())
}

/// Trims and checks a chat line.
pub fn validate_chat(raw: &str) -> Result<String, ValidationError> {
    let text = raw.trim();
    let len = text.chars().count();
    if len == 0 || len > MAX_CHAT_CHARS {
        return Err(ValidationError::ChatLength);
    }
    Ok(text.to_string())
}
