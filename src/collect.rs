// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Change collection.
//!
//! Gathers everything the rest of the pipeline needs to know about an event
//! from the repository in one go. Collection is all or nothing: if any query
//! fails, no partial data escapes.

use crate::{
    event::{Event, Mode, PropAction, Target},
    repos::{ChangeRecord, Location, Repository, Result},
};

use chrono::{DateTime, FixedOffset};
use tracing::{debug, instrument};

/// Collected data of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitData {
    pub location: Location,

    /// Revision to diff against, if any.
    pub base_revision: Option<u64>,
    pub author: Option<String>,
    pub log: Vec<u8>,
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// Changed paths in lexicographic order.
    pub changes: Vec<ChangeRecord>,
}

/// Collected data of a revision property change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropChangeData {
    pub revision: u64,
    pub author: Option<String>,
    pub propname: String,
    pub action: PropAction,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// Collected data of a lock or unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockData {
    pub author: Option<String>,
    pub action: Mode,

    /// Affected paths in lexicographic order.
    pub paths: Vec<String>,
}

/// Data collected for any kind of event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    Commit(CommitData),
    PropChange(PropChangeData),
    Lock(LockData),
}

impl EventData {
    /// Paths the group router should consider.
    ///
    /// Revision property changes have no paths of their own, so they route
    /// the empty path. So do commits that changed nothing.
    pub fn routed_paths(&self) -> Vec<String> {
        match self {
            Self::Commit(data) if data.changes.is_empty() => vec![String::new()],
            Self::Commit(data) => data.changes.iter().map(|c| c.path.clone()).collect(),
            Self::PropChange(_) => vec![String::new()],
            Self::Lock(data) => data.paths.clone(),
        }
    }

    pub fn author(&self) -> Option<&str> {
        match self {
            Self::Commit(data) => data.author.as_deref(),
            Self::PropChange(data) => data.author.as_deref(),
            Self::Lock(data) => data.author.as_deref(),
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Commit(data) => data.timestamp,
            Self::PropChange(data) => data.timestamp,
            Self::Lock(_) => None,
        }
    }
}

/// Collect data for event from repository.
///
/// # Errors
///
/// - Return [`RepositoryError`](crate::repos::RepositoryError) if any
///   repository query fails.
#[instrument(skip(repo, event), fields(mode = %event.mode), level = "debug")]
pub fn collect(repo: &dyn Repository, event: &Event) -> Result<EventData> {
    match (&event.mode, &event.target) {
        (Mode::Commit, Target::Revision(rev)) => {
            collect_commit(repo, &Location::Revision(*rev)).map(EventData::Commit)
        }
        (Mode::Commit, Target::Transaction(txn)) => {
            collect_commit(repo, &Location::Transaction(txn.clone())).map(EventData::Commit)
        }
        (Mode::PropChange, Target::Revision(rev)) => collect_propchange(
            repo,
            *rev,
            event.propname.as_deref().unwrap_or_default(),
            event.action.unwrap_or(PropAction::Modified),
            event.old_value.clone(),
            event.author.as_deref(),
        )
        .map(EventData::PropChange),
        (mode, _) => Ok(EventData::Lock(collect_lock(
            event.lock_paths.iter().map(String::as_str),
            event.author.as_deref(),
            *mode,
        ))),
    }
}

/// Collect author, log, timestamp, and changed paths of commit.
///
/// # Errors
///
/// - Return [`RepositoryError`](crate::repos::RepositoryError) if revision
///   is out of range, or transaction vanished.
pub fn collect_commit(repo: &dyn Repository, at: &Location) -> Result<CommitData> {
    let (author, log, timestamp, base_revision) = match at {
        Location::Revision(rev) => {
            let info = repo.revision_info(*rev)?;
            (info.author, info.log, info.timestamp, rev.checked_sub(1))
        }
        Location::Transaction(txn) => {
            let info = repo.transaction_info(txn)?;
            (info.author, info.log, None, info.base_revision)
        }
    };

    let mut changes = repo.changed_paths(at)?;
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("{at}: {} changed paths", changes.len());

    Ok(CommitData {
        location: at.clone(),
        base_revision,
        author,
        log,
        timestamp,
        changes,
    })
}

/// Collect before and after state of revision property change.
///
/// The old value is supplied by the caller, since the repository only holds
/// the new one. When no acting user is given, the revision author is used.
///
/// # Errors
///
/// - Return [`RepositoryError`](crate::repos::RepositoryError) if revision
///   is out of range.
pub fn collect_propchange(
    repo: &dyn Repository,
    rev: u64,
    propname: &str,
    action: PropAction,
    old_value: Option<String>,
    author: Option<&str>,
) -> Result<PropChangeData> {
    let info = repo.revision_info(rev)?;
    let mut props = repo.revision_properties(rev)?;
    let new_value = match action {
        PropAction::Deleted => None,
        _ => props.remove(propname),
    };
    let old_value = match action {
        PropAction::Added => None,
        _ => old_value,
    };

    Ok(PropChangeData {
        revision: rev,
        author: author.map(str::to_string).or(info.author),
        propname: propname.to_string(),
        action,
        old_value,
        new_value,
        timestamp: info.timestamp,
    })
}

/// Collect lock or unlock of paths.
///
/// Paths are normalized to a leading slash, sorted, and deduplicated.
pub fn collect_lock<'a>(
    paths: impl IntoIterator<Item = &'a str>,
    author: Option<&str>,
    action: Mode,
) -> LockData {
    let mut paths = paths
        .into_iter()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(|path| format!("/{}", path.trim_start_matches('/')))
        .collect::<Vec<_>>();
    paths.sort();
    paths.dedup();

    LockData {
        author: author.map(str::to_string),
        action,
        paths,
    }
}
