// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Text helpers for message rendering.

use crate::config::params::LogEncoding;

use std::fmt::Write;

/// Ellipsis appended to truncated subjects.
pub const ELLIPSIS: char = '…';

/// Convert bytes to text, escaping every invalid byte as `?\NNN`.
///
/// `NNN` is the byte value in zero-padded decimal. Valid UTF-8 runs are
/// copied through untouched.
pub fn escape_invalid(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
        for byte in chunk.invalid() {
            // INVARIANT: Writing into a String cannot fail.
            let _ = write!(text, "?\\{byte:03}");
        }
    }

    text
}

/// Decode raw log message.
pub fn decode_log(bytes: &[u8], encoding: LogEncoding) -> String {
    match encoding {
        LogEncoding::Replace => String::from_utf8_lossy(bytes).into_owned(),
        LogEncoding::Escape => escape_invalid(bytes),
    }
}

/// First non-blank line of text, trimmed.
pub fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

/// Cut text to at most `limit` characters.
///
/// Truncated text ends with [`ELLIPSIS`], which counts toward the limit.
pub fn truncate(text: &str, limit: usize) -> String {
    if limit == 0 || text.chars().count() <= limit {
        return text.to_string();
    }

    let mut cut = text.chars().take(limit - 1).collect::<String>();
    cut.push(ELLIPSIS);
    cut
}

/// Check if content looks binary.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}

/// Check if MIME type names non-textual content.
pub fn is_binary_mime_type(mime_type: &str) -> bool {
    let mime_type = mime_type.trim();
    !mime_type.is_empty() && !mime_type.starts_with("text/")
}

/// Indent every line of text.
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}\n"))
        .collect()
}
