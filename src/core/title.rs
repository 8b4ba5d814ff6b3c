//! Conversation titles derived from the first question asked.

use crate::infrastructure::entities::DEFAULT_TITLE;

/// Longest title taken verbatim from a message.
pub const MAX_DERIVED_TITLE_CHARS: usize = 37;

const ELLIPSIS: &str = "...";

/// True while the conversation still carries the placeholder title or none at all.
pub fn is_untitled(title: &str) -> bool {
    title == DEFAULT_TITLE || title.is_empty()
}

/// Shortens message content to a title, counting characters rather than bytes.
pub fn title_from_message(content: &str) -> String {
    match content.char_indices().nth(MAX_DERIVED_TITLE_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &content[..cut]),
        None => content.to_owned(),
    }
}

/// Title the conversation should carry given its first user message.
///
/// A title that is neither the placeholder nor blank is returned unchanged, so
/// repeated calls never re-derive or re-truncate.
pub fn derive_title(current: &str, first_user_message: &str) -> String {
    if is_untitled(current) {
        title_from_message(first_user_message)
    } else {
        current.to_owned()
    }
}

/// Title used at creation: the given one unless it is missing or blank.
pub fn initial_title(requested: Option<&str>) -> String {
    match requested {
        Some(title) if !title.trim().is_empty() => title.to_owned(),
        _ => DEFAULT_TITLE.to_owned(),
    }
}
