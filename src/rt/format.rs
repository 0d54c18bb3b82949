//! Text helpers for diagnostic lines: truncation, colours and the
//! `constable:` prefix.

use std::sync::Once;

use colored::Colorize;

/// Display budget for the source text of an instrumented statement.
pub const SOURCE_BUDGET: usize = 80;

const MARKER_OPEN: &str = "...[+";
const MARKER_CLOSE: &str = " chars]";

/// Cut `text` to `max_len` characters and append `...[+K chars]`.
///
/// Text already truncated at `max_len` comes back unchanged, so applying this
/// twice with the same limit is the same as applying it once.
pub fn truncate(text: &str, max_len: Option<usize>) -> String {
    let max_len = match max_len {
        Some(max_len) => max_len,
        None => return text.to_string(),
    };
    let count = text.chars().count();
    if count <= max_len {
        return text.to_string();
    }
    if let Some(kept) = truncated_prefix(text) {
        if kept.chars().count() <= max_len {
            return text.to_string();
        }
    }
    let head: String = text.chars().take(max_len).collect();
    format!("{}{}{}{}", head, MARKER_OPEN, count - max_len, MARKER_CLOSE)
}

/// The text before a trailing `...[+K chars]` marker, if there is one.
fn truncated_prefix(text: &str) -> Option<&str> {
    let rest = text.strip_suffix(MARKER_CLOSE)?;
    let open = rest.rfind(MARKER_OPEN)?;
    let digits = &rest[open + MARKER_OPEN.len()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(&text[..open])
}

/// Cut statement text to `budget` characters and append `...`.
pub fn truncate_source(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let head: String = text.chars().take(budget).collect();
    format!("{}...", head)
}

static COLOR_CHOICE: Once = Once::new();

/// Colours are on unless [`set_colors`] said otherwise, whatever the
/// terminal or the environment.
fn ensure_colors() {
    COLOR_CHOICE.call_once(|| colored::control::set_override(true));
}

pub fn green(text: &str) -> String {
    ensure_colors();
    text.green().to_string()
}

pub fn blue(text: &str) -> String {
    ensure_colors();
    text.blue().to_string()
}

/// Force colours on or off for the rest of the process.
pub fn set_colors(enabled: bool) {
    COLOR_CHOICE.call_once(|| {});
    colored::control::set_override(enabled);
}

/// `constable: name`, `constable: name: line N` or `constable: name: line N to M`.
pub fn prefix(function: &str, line: Option<u32>, to_line: Option<u32>) -> String {
    let mut signature = function.to_string();
    if let Some(line) = line {
        signature.push_str(&format!(": line {}", line));
    }
    if let Some(to_line) = to_line {
        signature.push_str(&format!(" to {}", to_line));
    }
    format!("{} {}", blue("constable:"), signature)
}
