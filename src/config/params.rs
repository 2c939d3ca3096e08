// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Typed parameter values.
//!
//! Most parameters are free text, but a handful take one of a fixed set of
//! values. Those are parsed here, both to validate literal values when the
//! configuration loads, and to interpret expanded values while rendering.

use std::{collections::BTreeSet, str::FromStr};

/// Parameter holding a subject length limit.
pub const TRUNCATE_SUBJECT: &str = "truncate_subject";

/// Whether paths outside of a group show up in its message.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowNonmatching {
    /// List them, and include their diffs.
    #[default]
    Yes,

    /// Leave them out entirely.
    No,

    /// List them without diffs.
    Summary,
}

impl FromStr for ShowNonmatching {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "on" | "1" => Ok(Self::Yes),
            "no" | "false" | "off" | "0" => Ok(Self::No),
            "summary" => Ok(Self::Summary),
            other => Err(format!("expected yes, no, or summary, found {other:?}")),
        }
    }
}

/// Kind of change that may get a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiffKind {
    Add,
    Copy,
    Modify,
    Delete,
    Propchange,
}

impl DiffKind {
    /// Name of parameter holding the marker template of this kind.
    pub fn template_param(&self) -> &'static str {
        match self {
            Self::Add => "diff_add",
            Self::Copy => "diff_copy",
            Self::Modify => "diff_modify",
            Self::Delete => "diff_delete",
            Self::Propchange => "diff_propchange",
        }
    }

    /// Marker template used when none is configured.
    pub fn default_template(&self) -> &'static str {
        match self {
            Self::Add => "Added: %(path)s",
            Self::Copy => "Copied: %(path)s (from r%(base_rev)s, %(base_path)s)",
            Self::Modify => "Modified: %(path)s",
            Self::Delete => "Deleted: %(path)s",
            Self::Propchange => "Propchange: %(path)s",
        }
    }
}

impl FromStr for DiffKind {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "add" => Ok(Self::Add),
            "copy" => Ok(Self::Copy),
            "modify" => Ok(Self::Modify),
            "delete" => Ok(Self::Delete),
            "propchange" => Ok(Self::Propchange),
            other => Err(format!(
                "expected add, copy, modify, delete, or propchange, found {other:?}"
            )),
        }
    }
}

/// Set of change kinds to emit diffs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffKinds(BTreeSet<DiffKind>);

impl DiffKinds {
    pub fn contains(&self, kind: DiffKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for DiffKinds {
    fn default() -> Self {
        Self(BTreeSet::from([DiffKind::Add, DiffKind::Copy, DiffKind::Modify]))
    }
}

impl FromStr for DiffKinds {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        data.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|word| !word.is_empty())
            .map(str::parse)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }
}

/// How to secure the SMTP connection.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    #[default]
    Plain,

    /// TLS from the first byte.
    Ssl,

    /// Upgrade plain connection through STARTTLS.
    StartTls,
}

impl FromStr for SmtpSecurity {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().to_ascii_lowercase().as_str() {
            "" | "no" | "false" | "off" | "0" => Ok(Self::Plain),
            "yes" | "true" | "on" | "1" | "ssl" => Ok(Self::Ssl),
            "starttls" => Ok(Self::StartTls),
            other => Err(format!("expected yes, no, or starttls, found {other:?}")),
        }
    }
}

/// How to render log messages holding invalid UTF-8.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEncoding {
    /// Replace invalid sequences with U+FFFD.
    #[default]
    Replace,

    /// Escape each invalid byte, the same way diffs do.
    Escape,
}

impl FromStr for LogEncoding {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim() {
            "replace" | "utf8" | "utf-8" => Ok(Self::Replace),
            "escape" => Ok(Self::Escape),
            other => Err(format!("expected replace or escape, found {other:?}")),
        }
    }
}

/// Strictly positive count, e.g., subject length or timeout in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Positive(pub u64);

impl FromStr for Positive {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(format!("expected a positive integer, found {data:?}")),
            Ok(value) => Ok(Self(value)),
        }
    }
}

/// Check literal value of parameter with a fixed value set.
///
/// Parameters without a fixed value set always pass.
pub fn validate(param: &str, value: &str) -> Result<(), String> {
    match param {
        TRUNCATE_SUBJECT | "smtp_timeout" => value.parse::<Positive>().map(drop),
        "smtp_port" => value
            .trim()
            .parse::<u16>()
            .map(drop)
            .map_err(|_| format!("expected a port number, found {value:?}")),
        "smtp_use_ssl" => value.parse::<SmtpSecurity>().map(drop),
        "show_nonmatching_paths" => value.parse::<ShowNonmatching>().map(drop),
        "generate_diffs" => value.parse::<DiffKinds>().map(drop),
        "log_encoding" => value.parse::<LogEncoding>().map(drop),
        _ => Ok(()),
    }
}
