// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository access.
//!
//! The mailer never talks to a Subversion repository directly. Everything it
//! needs to know about an event comes through the small [`Repository`]
//! surface defined here, so the rest of the crate does not care whether the
//! data comes from `svnlook`, or from an in-memory fixture during tests.
//!
//! # See Also
//!
//! - [`svnlook`]

pub mod svnlook;

#[cfg(test)]
pub(crate) mod fixture;

pub use svnlook::Svnlook;

use chrono::{DateTime, FixedOffset};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

/// Property mapping of a node or revision.
pub type Properties = BTreeMap<String, String>;

/// Point in repository history to read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// Committed revision.
    Revision(u64),

    /// Uncommitted transaction, e.g., during pre-commit.
    Transaction(String),
}

impl Display for Location {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Revision(rev) => write!(fmt, "r{rev}"),
            Self::Transaction(txn) => write!(fmt, "txn {txn}"),
        }
    }
}

/// Kind of node that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

/// What happened to a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Added,
    Deleted,
    Modified,
    Replaced,
    Copied,
}

/// Metadata for one changed path of a commit.
///
/// # Invariant
///
/// - [`Action::Copied`] always carries copy source path and revision.
/// - Directories never have `text_changed` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Absolute repository path, always with a leading slash.
    pub path: String,
    pub kind: NodeKind,
    pub action: Action,
    pub copy_source_path: Option<String>,
    pub copy_source_revision: Option<u64>,
    pub text_changed: bool,
    pub props_changed: bool,
}

impl ChangeRecord {
    /// Check if record describes a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Copy source as `(path, revision)` pair, if any.
    pub fn copy_source(&self) -> Option<(&str, u64)> {
        self.copy_source_path
            .as_deref()
            .zip(self.copy_source_revision)
    }
}

/// Author, date, and log of a committed revision.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RevisionInfo {
    pub author: Option<String>,
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// Raw log message. Historical repositories may hold non-UTF-8 bytes.
    pub log: Vec<u8>,
}

/// Author and log of an uncommitted transaction.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub author: Option<String>,
    pub log: Vec<u8>,

    /// Revision the transaction is based on, when the backend knows it.
    pub base_revision: Option<u64>,
}

/// Read access to repository history.
pub trait Repository {
    /// Author, timestamp, and log of committed revision.
    fn revision_info(&self, rev: u64) -> Result<RevisionInfo>;

    /// Unversioned properties of committed revision.
    fn revision_properties(&self, rev: u64) -> Result<Properties>;

    /// Author and log of uncommitted transaction.
    fn transaction_info(&self, txn: &str) -> Result<TransactionInfo>;

    /// Every path changed at location.
    fn changed_paths(&self, at: &Location) -> Result<Vec<ChangeRecord>>;

    /// Contents of file at location.
    fn file_bytes(&self, path: &str, at: &Location) -> Result<Vec<u8>>;

    /// Versioned properties of node at location.
    fn file_properties(&self, path: &str, at: &Location) -> Result<Properties>;
}

/// Repository access error types.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Path does not look like a repository.
    #[error("cannot open repository at {:?}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    /// Repository tool cannot be spawned.
    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Repository tool exits with failure, e.g., unknown revision.
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    /// Repository tool output cannot be understood.
    #[error("unexpected output from {command}: {line:?}")]
    Malformed { command: String, line: String },
}

/// Friendly result alias :3
pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;
