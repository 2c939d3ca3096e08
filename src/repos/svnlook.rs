// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository access through `svnlook`.
//!
//! Shells out to the `svnlook` binary for every query. Nothing is cached, so
//! each call reflects the repository as it is right now, which matters for
//! transactions that may vanish once the commit completes or aborts.

use crate::repos::{
    Action, ChangeRecord, Location, NodeKind, Properties, Repository, RepositoryError, Result,
    RevisionInfo, TransactionInfo,
};

use chrono::DateTime;
use std::{
    ffi::{OsStr, OsString},
    path::PathBuf,
    process::Command,
};
use tracing::{debug, instrument};

/// Repository backed by the `svnlook` command.
#[derive(Debug, Clone)]
pub struct Svnlook {
    path: PathBuf,
    program: OsString,
}

impl Svnlook {
    /// Open repository at path.
    ///
    /// Only checks that the path has the layout of a repository. Access
    /// problems surface on the first query.
    ///
    /// # Errors
    ///
    /// - Return [`RepositoryError::Open`] if path is not a repository.
    #[instrument(skip(path), level = "debug")]
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("open repository {:?}", path.display());
        if !path.join("format").is_file() || !path.join("db").is_dir() {
            return Err(RepositoryError::Open {
                path,
                reason: "not a Subversion repository".into(),
            });
        }

        Ok(Self {
            path,
            program: "svnlook".into(),
        })
    }

    /// Use a different `svnlook` binary, e.g., one outside of `PATH`.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn look(&self, subcommand: &str, at: Option<&Location>, rest: &[&str]) -> Result<Vec<u8>> {
        let mut args: Vec<OsString> = vec![subcommand.into(), self.path.clone().into()];
        args.extend(rest.iter().map(OsString::from));
        match at {
            Some(Location::Revision(rev)) => args.extend(["-r".into(), rev.to_string().into()]),
            Some(Location::Transaction(txn)) => args.extend(["-t".into(), txn.into()]),
            None => {}
        }

        syscall(&self.program, args)
    }

    fn look_text(&self, subcommand: &str, at: Option<&Location>, rest: &[&str]) -> Result<String> {
        let bytes = self.look(subcommand, at, rest)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // INVARIANT: Copies are only "modified" if their text differs from source.
    fn copy_text_changed(&self, record: &ChangeRecord, at: &Location) -> Result<bool> {
        let Some((source, rev)) = record.copy_source() else {
            return Ok(true);
        };
        let before = self.file_bytes(source, &Location::Revision(rev))?;
        let after = self.file_bytes(&record.path, at)?;

        Ok(before != after)
    }
}

impl Repository for Svnlook {
    fn revision_info(&self, rev: u64) -> Result<RevisionInfo> {
        let at = Location::Revision(rev);
        let author = self.look_text("author", Some(&at), &[])?;
        let date = self.look_text("date", Some(&at), &[])?;
        let log = self.look("log", Some(&at), &[])?;

        Ok(RevisionInfo {
            author: non_empty(author),
            timestamp: parse_date(&date)?,
            log: chomp(log),
        })
    }

    fn revision_properties(&self, rev: u64) -> Result<Properties> {
        let output =
            self.look_text("proplist", Some(&Location::Revision(rev)), &["-v", "--revprop"])?;
        parse_proplist(&output)
    }

    fn transaction_info(&self, txn: &str) -> Result<TransactionInfo> {
        let at = Location::Transaction(txn.to_string());
        let author = self.look_text("author", Some(&at), &[])?;
        let log = self.look("log", Some(&at), &[])?;
        let youngest = self.look_text("youngest", None, &[])?;

        Ok(TransactionInfo {
            author: non_empty(author),
            log: chomp(log),
            base_revision: youngest.trim().parse().ok(),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn changed_paths(&self, at: &Location) -> Result<Vec<ChangeRecord>> {
        let output = self.look_text("changed", Some(at), &["--copy-info"])?;
        let mut records = parse_changed(&output)?;
        for record in records.iter_mut() {
            if record.action == Action::Copied && !record.is_dir() {
                record.text_changed = self.copy_text_changed(record, at)?;
            }
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(records)
    }

    fn file_bytes(&self, path: &str, at: &Location) -> Result<Vec<u8>> {
        self.look("cat", Some(at), &[path])
    }

    fn file_properties(&self, path: &str, at: &Location) -> Result<Properties> {
        let output = self.look_text("proplist", Some(at), &["-v", path])?;
        parse_proplist(&output)
    }
}

/// Parse output of `svnlook changed --copy-info`.
///
/// Each entry starts with a three column status, a space, and the path.
/// Directories carry a trailing slash. Copies are followed by an indented
/// `(from PATH:rREV)` line.
///
/// # Errors
///
/// - Return [`RepositoryError::Malformed`] for lines that fit neither shape.
pub fn parse_changed(output: &str) -> Result<Vec<ChangeRecord>> {
    let malformed = |line: &str| RepositoryError::Malformed {
        command: "svnlook changed".into(),
        line: line.to_string(),
    };
    let mut records: Vec<ChangeRecord> = Vec::new();

    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        if let Some(from) = line.trim_start().strip_prefix("(from ") {
            let (source, rev) = from
                .strip_suffix(')')
                .and_then(|from| from.rsplit_once(":r"))
                .ok_or_else(|| malformed(line))?;
            let record = records.last_mut().ok_or_else(|| malformed(line))?;
            record.copy_source_path = Some(normalize(source));
            record.copy_source_revision = Some(rev.parse().map_err(|_| malformed(line))?);
            continue;
        }

        let status = line.get(..3).ok_or_else(|| malformed(line))?.as_bytes();
        let path = line.get(4..).filter(|p| !p.is_empty()).ok_or_else(|| malformed(line))?;
        let kind = if path.ends_with('/') {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        let copied = status[2] == b'+';
        let (action, text_changed) = match status[0] {
            b'A' if copied => (Action::Copied, true),
            b'A' => (Action::Added, true),
            b'D' => (Action::Deleted, false),
            b'R' => (Action::Replaced, true),
            b'U' => (Action::Modified, true),
            b'_' => (Action::Modified, false),
            _ => return Err(malformed(line)),
        };

        records.push(ChangeRecord {
            path: normalize(path),
            kind,
            action,
            copy_source_path: None,
            copy_source_revision: None,
            text_changed: text_changed && kind == NodeKind::File,
            props_changed: status[1] == b'U',
        });
    }

    if let Some(record) = records
        .iter()
        .find(|record| record.action == Action::Copied && record.copy_source().is_none())
    {
        return Err(malformed(&record.path));
    }

    Ok(records)
}

/// Parse output of `svnlook proplist -v`.
///
/// Property names are indented by two spaces, value lines by four.
pub fn parse_proplist(output: &str) -> Result<Properties> {
    let mut props = Properties::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in output.lines() {
        if let Some(value) = line.strip_prefix("    ") {
            match current.as_mut() {
                Some((_, lines)) => lines.push(value),
                None => {
                    return Err(RepositoryError::Malformed {
                        command: "svnlook proplist".into(),
                        line: line.to_string(),
                    })
                }
            }
        } else if let Some(name) = line.strip_prefix("  ") {
            if let Some((name, lines)) = current.take() {
                props.insert(name, lines.join("\n"));
            }
            current = Some((name.trim().to_string(), Vec::new()));
        }
    }
    if let Some((name, lines)) = current {
        props.insert(name, lines.join("\n"));
    }

    Ok(props)
}

fn parse_date(output: &str) -> Result<Option<DateTime<chrono::FixedOffset>>> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(None);
    }

    // INVARIANT: svnlook appends a human readable form in parentheses.
    let stamp = output.split(" (").next().unwrap_or(output);
    DateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S %z")
        .map(Some)
        .map_err(|_| RepositoryError::Malformed {
            command: "svnlook date".into(),
            line: output.to_string(),
        })
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/').trim_start_matches('/');
    format!("/{trimmed}")
}

fn non_empty(text: String) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn chomp(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.ends_with(b"\n") {
        bytes.pop();
    }
    bytes
}

fn syscall(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<Vec<u8>> {
    let args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect::<Vec<_>>();
    let output = Command::new(cmd.as_ref())
        .args(&args)
        .output()
        .map_err(|err| RepositoryError::Spawn {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            source: err,
        })?;

    if !output.status.success() {
        let command = std::iter::once(cmd.as_ref())
            .chain(args.iter().map(OsString::as_os_str))
            .map(OsStr::to_string_lossy)
            .collect::<Vec<_>>()
            .join(" ");
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RepositoryError::Command {
            command,
            message: stderr.trim().to_string(),
        });
    }

    Ok(output.stdout)
}
