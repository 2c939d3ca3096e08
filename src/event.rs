// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hook events.
//!
//! An [`Event`] records what a single hook invocation is about: which
//! repository, which kind of change, and which revision, transaction, or
//! lock owner. It is built once from invocation arguments and only ever read
//! afterwards.

use crate::path::repos_basename;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Kind of hook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Commit,
    PropChange,
    Lock,
    Unlock,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::PropChange => "propchange",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

impl FromStr for Mode {
    type Err = EventError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "commit" => Ok(Self::Commit),
            "propchange" => Ok(Self::PropChange),
            "lock" => Ok(Self::Lock),
            "unlock" => Ok(Self::Unlock),
            other => Err(EventError::UnknownMode(other.to_string())),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Action taken on a revision property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropAction {
    Added,
    Modified,
    Deleted,
}

impl PropAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl FromStr for PropAction {
    type Err = EventError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "A" => Ok(Self::Added),
            "M" => Ok(Self::Modified),
            "D" => Ok(Self::Deleted),
            other => Err(EventError::UnknownPropAction(other.to_string())),
        }
    }
}

/// What the event identifier refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Revision(u64),
    Transaction(String),
    LockOwner(String),
}

/// One hook invocation's subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub repos_path: PathBuf,
    pub repos_basename: String,
    pub mode: Mode,
    pub target: Target,
    pub author: Option<String>,
    pub propname: Option<String>,
    pub action: Option<PropAction>,
    pub old_value: Option<String>,

    /// Paths locked or unlocked, for lock events.
    pub lock_paths: Vec<String>,
}

impl Event {
    /// Construct commit event.
    ///
    /// Numeric identifiers are revisions, anything else is a transaction.
    ///
    /// # Errors
    ///
    /// - Return [`EventError::MissingId`] if identifier is blank.
    pub fn commit(repos_path: impl Into<PathBuf>, id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(EventError::MissingId);
        }
        let target = match id.parse() {
            Ok(rev) => Target::Revision(rev),
            Err(_) => Target::Transaction(id.to_string()),
        };

        Ok(Self::blank(repos_path.into(), Mode::Commit, target))
    }

    /// Construct revision property change event.
    ///
    /// # Errors
    ///
    /// - Return [`EventError::BadRevision`] if identifier is not a revision.
    pub fn propchange(
        repos_path: impl Into<PathBuf>,
        id: &str,
        propname: impl Into<String>,
        action: PropAction,
        old_value: Option<String>,
    ) -> Result<Self> {
        let rev = id
            .trim()
            .parse()
            .map_err(|_| EventError::BadRevision(id.to_string()))?;
        let mut event = Self::blank(repos_path.into(), Mode::PropChange, Target::Revision(rev));
        event.propname = Some(propname.into());
        event.action = Some(action);
        event.old_value = old_value;

        Ok(event)
    }

    /// Construct lock or unlock event for a set of paths.
    ///
    /// # Errors
    ///
    /// - Return [`EventError::NotLockMode`] if mode is not a lock mode.
    pub fn lock(
        repos_path: impl Into<PathBuf>,
        mode: Mode,
        owner: &str,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        if !matches!(mode, Mode::Lock | Mode::Unlock) {
            return Err(EventError::NotLockMode(mode));
        }
        let mut event = Self::blank(
            repos_path.into(),
            mode,
            Target::LockOwner(owner.trim().to_string()),
        );
        event.author = Some(owner.trim().to_string()).filter(|owner| !owner.is_empty());
        event.lock_paths = paths.into_iter().map(Into::into).collect();

        Ok(event)
    }

    /// Attach acting user to event.
    pub fn with_author(mut self, author: Option<String>) -> Self {
        if author.is_some() {
            self.author = author;
        }
        self
    }

    /// Revision number of event, if it refers to one.
    pub fn revision(&self) -> Option<u64> {
        match self.target {
            Target::Revision(rev) => Some(rev),
            _ => None,
        }
    }

    pub fn repos_path(&self) -> &Path {
        &self.repos_path
    }

    fn blank(repos_path: PathBuf, mode: Mode, target: Target) -> Self {
        Self {
            repos_basename: repos_basename(&repos_path),
            repos_path,
            mode,
            target,
            author: None,
            propname: None,
            action: None,
            old_value: None,
            lock_paths: Vec::new(),
        }
    }
}

/// Event construction error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("unknown mode {0:?}, expected commit, propchange, lock, or unlock")]
    UnknownMode(String),

    #[error("unknown property action {0:?}, expected A, M, or D")]
    UnknownPropAction(String),

    #[error("expected a revision number, found {0:?}")]
    BadRevision(String),

    #[error("missing revision or transaction identifier")]
    MissingId,

    #[error("propchange needs a property name and an action")]
    MissingPropArgs,

    #[error("mode {0} does not take lock paths")]
    NotLockMode(Mode),
}

/// Friendly result alias :3
pub type Result<T, E = EventError> = std::result::Result<T, E>;
