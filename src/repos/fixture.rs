// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-memory repository for unit tests.

use crate::repos::{
    Action, ChangeRecord, Location, NodeKind, Properties, Repository, RepositoryError, Result,
    RevisionInfo, TransactionInfo,
};

use chrono::DateTime;
use std::{cell::Cell, collections::BTreeMap};

/// Key used for transaction state, which sorts after every revision.
const TXN: u64 = u64::MAX;

#[derive(Default)]
pub struct Fixture {
    revisions: BTreeMap<u64, RevisionInfo>,
    revprops: BTreeMap<u64, Properties>,
    changes: BTreeMap<u64, Vec<ChangeRecord>>,
    files: BTreeMap<(String, u64), Vec<u8>>,
    props: BTreeMap<(String, u64), Properties>,

    /// Number of file content reads so far.
    pub reads: Cell<usize>,
}

impl Fixture {
    pub fn commit(mut self, rev: u64, author: &str, log: &str) -> Self {
        let info = RevisionInfo {
            author: Some(author.to_string()).filter(|author| !author.is_empty()),
            timestamp: DateTime::parse_from_rfc3339("2024-01-02T10:20:30+00:00").ok(),
            log: log.as_bytes().to_vec(),
        };
        self.revisions.insert(rev, info);
        self.revprops
            .entry(rev)
            .or_default()
            .insert("svn:log".into(), log.into());
        self
    }

    pub fn change(mut self, rev: u64, record: ChangeRecord) -> Self {
        self.changes.entry(rev).or_default().push(record);
        self
    }

    pub fn file(mut self, path: &str, rev: u64, data: &[u8]) -> Self {
        self.files.insert((path.into(), rev), data.to_vec());
        self
    }

    pub fn prop(mut self, path: &str, rev: u64, name: &str, value: &str) -> Self {
        self.props
            .entry((path.into(), rev))
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    pub fn revprop(mut self, rev: u64, name: &str, value: &str) -> Self {
        self.revprops
            .entry(rev)
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    fn key(at: &Location) -> u64 {
        match at {
            Location::Revision(rev) => *rev,
            Location::Transaction(_) => TXN,
        }
    }

    fn missing(what: &str, name: impl std::fmt::Display) -> RepositoryError {
        RepositoryError::Command {
            command: what.to_string(),
            message: format!("no such thing: {name}"),
        }
    }
}

impl Repository for Fixture {
    fn revision_info(&self, rev: u64) -> Result<RevisionInfo> {
        self.revisions
            .get(&rev)
            .cloned()
            .ok_or_else(|| Self::missing("info", rev))
    }

    fn revision_properties(&self, rev: u64) -> Result<Properties> {
        self.revprops
            .get(&rev)
            .cloned()
            .ok_or_else(|| Self::missing("proplist", rev))
    }

    fn transaction_info(&self, txn: &str) -> Result<TransactionInfo> {
        let info = self
            .revisions
            .get(&TXN)
            .ok_or_else(|| Self::missing("info", txn))?;
        Ok(TransactionInfo {
            author: info.author.clone(),
            log: info.log.clone(),
            base_revision: self.revisions.keys().rev().nth(1).copied(),
        })
    }

    fn changed_paths(&self, at: &Location) -> Result<Vec<ChangeRecord>> {
        Ok(self.changes.get(&Self::key(at)).cloned().unwrap_or_default())
    }

    fn file_bytes(&self, path: &str, at: &Location) -> Result<Vec<u8>> {
        self.reads.set(self.reads.get() + 1);
        self.files
            .get(&(path.to_string(), Self::key(at)))
            .cloned()
            .ok_or_else(|| Self::missing("cat", path))
    }

    fn file_properties(&self, path: &str, at: &Location) -> Result<Properties> {
        Ok(self
            .props
            .get(&(path.to_string(), Self::key(at)))
            .cloned()
            .unwrap_or_default())
    }
}

/// File change record with text changes for modifications.
pub fn record(path: &str, action: Action) -> ChangeRecord {
    ChangeRecord {
        path: path.into(),
        kind: NodeKind::File,
        action,
        copy_source_path: None,
        copy_source_revision: None,
        text_changed: matches!(action, Action::Modified),
        props_changed: false,
    }
}
