// src/utils/html.rs

/// Sanitizes staff-authored free text (question content, module descriptions) before storage.
///
/// Whitelist-based: safe inline tags like <b> survive, while <script> and event attributes are
/// removed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
