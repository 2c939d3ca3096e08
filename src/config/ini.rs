// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sectioned configuration file syntax.
//!
//! Parses the line-oriented, RFC 822 flavoured format that the mailer
//! configuration is written in:
//!
//! ```text
//! # comment
//! [section]
//! key = value
//! other: value that
//!   continues here
//! ```
//!
//! This layer only knows about syntax. It keeps sections and entries in file
//! order along with their line numbers so the model built on top of it can
//! report semantic errors with useful context. Serializing a document and
//! parsing the result again always yields an equal document.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Parsed configuration document.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the document came from, for error reporting.
    pub origin: String,

    /// Sections in file order.
    pub sections: Vec<Section>,
}

/// A `[name]` section with its entries.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub line: usize,
    pub entries: Vec<Entry>,
}

/// A single `key = value` entry. Continuation lines are already folded into
/// the value.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub line: usize,
}

impl Section {
    /// Lookup value of key in section.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Check if section sets key at all, even to an empty value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key == key)
    }
}

impl Document {
    /// Parse document from text.
    ///
    /// # Errors
    ///
    /// - Return [`SyntaxError`] for malformed section headers, key lines
    ///   outside of a section, continuation lines without a preceding entry,
    ///   and duplicate sections or keys.
    pub fn parse(source: &str, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let mut sections: Vec<Section> = Vec::new();
        let fail = |line: usize, message: String| SyntaxError {
            origin: origin.clone(),
            line,
            message,
        };

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // INVARIANT: Leading whitespace always means continuation.
            if raw.starts_with(char::is_whitespace) {
                let entry = sections
                    .last_mut()
                    .and_then(|section| section.entries.last_mut())
                    .ok_or_else(|| fail(line, "continuation line without a preceding key".into()))?;
                if entry.value.is_empty() {
                    entry.value.push_str(trimmed);
                } else {
                    entry.value.push(' ');
                    entry.value.push_str(trimmed);
                }
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty() && !name.contains(['[', ']']))
                    .ok_or_else(|| fail(line, format!("malformed section header {trimmed:?}")))?;
                if sections.iter().any(|section| section.name == name) {
                    return Err(fail(line, format!("duplicate section [{name}]")));
                }
                sections.push(Section {
                    name: name.to_string(),
                    line,
                    entries: Vec::new(),
                });
                continue;
            }

            let (key, value) = split_entry(trimmed)
                .ok_or_else(|| fail(line, format!("expected 'key = value', found {trimmed:?}")))?;
            let section = sections
                .last_mut()
                .ok_or_else(|| fail(line, format!("key {key:?} appears before any section")))?;
            if section.contains(key) {
                return Err(fail(
                    line,
                    format!("duplicate key {key:?} in section [{}]", section.name),
                ));
            }
            section.entries.push(Entry {
                key: key.to_string(),
                value: value.to_string(),
                line,
            });
        }

        Ok(Self { origin, sections })
    }

    /// Lookup section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }
}

impl Display for Document {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 {
                writeln!(fmt)?;
            }
            writeln!(fmt, "[{}]", section.name)?;
            for entry in &section.entries {
                if entry.value.is_empty() {
                    writeln!(fmt, "{} =", entry.key)?;
                } else {
                    writeln!(fmt, "{} = {}", entry.key, entry.value)?;
                }
            }
        }

        Ok(())
    }
}

// Split "key = value" or "key: value". The key is everything up to the first
// separator or whitespace; grammar checks on the key happen in the model.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let end = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace())?;
    let key = &line[..end];
    let rest = line[end..].trim_start();
    let value = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))?;

    (!key.is_empty()).then(|| (key, value.trim()))
}

/// Configuration syntax error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{origin}:{line}: {message}")]
pub struct SyntaxError {
    pub origin: String,
    pub line: usize,
    pub message: String,
}

/// Friendly result alias :3
pub type Result<T, E = SyntaxError> = std::result::Result<T, E>;
