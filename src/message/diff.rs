// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Lazy diff rendering.
//!
//! A [`DiffSection`] is planned up front from change records alone, which
//! is cheap. File contents are only pulled from the repository when the
//! section is iterated, one framed block at a time, so a consumer that stops
//! early never pays for the rest.

use crate::{
    config::params::{DiffKind, DiffKinds},
    message::text::{escape_invalid, is_binary, is_binary_mime_type},
    repos::{Action, ChangeRecord, Location, NodeKind, Properties, Repository},
};

use similar::TextDiff;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, warn};

const CONTENT_RULE: &str =
    "==============================================================================";
const PROPERTY_RULE: &str =
    "______________________________________________________________________________";

/// Node state on one side of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Side {
    path: String,
    at: Location,
}

impl Side {
    fn label(&self) -> String {
        format!("{}\t({})", self.path, self.at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Heading(String),
    Content {
        marker: String,
        path: String,
        old: Option<Side>,
        new: Option<Side>,
    },
    Properties {
        marker: String,
        old: Option<Side>,
        new: Side,
    },
}

/// Diffs between the prior and new state of a set of changed paths.
///
/// Finite, and not restartable: every block is rendered at most once.
pub struct DiffSection<'r> {
    repo: &'r dyn Repository,
    location: Location,
    base: Option<Location>,
    blocks: VecDeque<Block>,
}

impl<'r> DiffSection<'r> {
    /// Construct empty section diffing `location` against `base_revision`.
    pub fn new(repo: &'r dyn Repository, location: Location, base_revision: Option<u64>) -> Self {
        Self {
            repo,
            location,
            base: base_revision.map(Location::Revision),
            blocks: VecDeque::new(),
        }
    }

    /// Queue a plain heading line.
    pub fn push_heading(&mut self, text: impl Into<String>) {
        self.blocks.push_back(Block::Heading(text.into()));
    }

    /// Queue diffs for a changed path.
    ///
    /// The `marker` callback renders the marker line of a diff kind for the
    /// record, or returns `None` to suppress that kind for it.
    pub fn push_record(
        &mut self,
        record: &ChangeRecord,
        kinds: &DiffKinds,
        marker: impl Fn(DiffKind, &ChangeRecord) -> Option<String>,
    ) {
        let here = Side {
            path: record.path.clone(),
            at: self.location.clone(),
        };
        let before = self.base.clone().map(|at| Side {
            path: record.path.clone(),
            at,
        });
        let source = record.copy_source().map(|(path, rev)| Side {
            path: path.to_string(),
            at: Location::Revision(rev),
        });

        if record.kind == NodeKind::File {
            let planned = match record.action {
                Action::Added => Some((DiffKind::Add, None, Some(here.clone()))),
                Action::Copied => Some((DiffKind::Copy, source.clone(), Some(here.clone()))),
                Action::Modified if record.text_changed => {
                    Some((DiffKind::Modify, before.clone(), Some(here.clone())))
                }
                Action::Deleted => Some((DiffKind::Delete, before.clone(), None)),
                Action::Replaced => {
                    let kind = match kinds.contains(DiffKind::Add) {
                        true => DiffKind::Add,
                        false => DiffKind::Delete,
                    };
                    Some((kind, before.clone(), Some(here.clone())))
                }
                Action::Modified => None,
            };

            if let Some((kind, old, new)) = planned {
                let needs_base = matches!(record.action, Action::Modified | Action::Deleted);
                if !kinds.contains(kind) {
                    debug!("no {kind:?} diff for {}", record.path);
                } else if needs_base && old.is_none() {
                    debug!("no base revision to diff {} against", record.path);
                } else if let Some(line) = marker(kind, record) {
                    let line = match record.action {
                        Action::Replaced => format!("Replaced: {}", record.path),
                        _ => line,
                    };
                    self.blocks.push_back(Block::Content {
                        marker: line,
                        path: record.path.clone(),
                        old,
                        new,
                    });
                }
            }
        }

        if record.props_changed
            && record.action != Action::Deleted
            && kinds.contains(DiffKind::Propchange)
        {
            if let Some(line) = marker(DiffKind::Propchange, record) {
                let old = match record.action {
                    Action::Copied => source,
                    Action::Added => None,
                    _ => before,
                };
                self.blocks.push_back(Block::Properties {
                    marker: line,
                    old,
                    new: here,
                });
            }
        }
    }

    /// Move every block of another section to the end of this one.
    pub fn append(&mut self, mut other: DiffSection<'_>) {
        self.blocks.append(&mut other.blocks);
    }

    /// Number of blocks not rendered yet.
    pub fn remaining(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn render(&self, block: Block) -> String {
        match block {
            Block::Heading(text) => format!("{text}\n\n"),
            Block::Content {
                marker,
                path,
                old,
                new,
            } => {
                let mut chunk = format!("{marker}\n{CONTENT_RULE}\n");
                match self.render_content(&path, old.as_ref(), new.as_ref()) {
                    Ok(text) => chunk.push_str(&text),
                    Err(err) => {
                        warn!("cannot diff {path}: {err}");
                        chunk.push_str(&format!("(diff unavailable: {err})\n"));
                    }
                }
                chunk.push('\n');
                chunk
            }
            Block::Properties { marker, old, new } => {
                let mut chunk = format!("{marker}\n{PROPERTY_RULE}\n");
                match self.render_properties(old.as_ref(), &new) {
                    Ok(text) => chunk.push_str(&text),
                    Err(err) => {
                        warn!("cannot diff properties of {}: {err}", new.path);
                        chunk.push_str(&format!("(diff unavailable: {err})\n"));
                    }
                }
                chunk.push('\n');
                chunk
            }
        }
    }

    fn render_content(
        &self,
        path: &str,
        old: Option<&Side>,
        new: Option<&Side>,
    ) -> crate::repos::Result<String> {
        let old_bytes = self.content(old)?;
        let new_bytes = self.content(new)?;

        if is_binary(&old_bytes) || is_binary(&new_bytes) || self.binary_mime_type(old, new) {
            return Ok("Binary file differs\n".into());
        }

        let old_label = old
            .map(Side::label)
            .unwrap_or_else(|| format!("{path}\t(added)"));
        let new_label = new
            .map(Side::label)
            .unwrap_or_else(|| format!("{path}\t(deleted)"));
        let old_text = escape_invalid(&old_bytes);
        let new_text = escape_invalid(&new_bytes);
        let diff = TextDiff::from_lines(&old_text, &new_text)
            .unified_diff()
            .context_radius(3)
            .header(&old_label, &new_label)
            .to_string();

        Ok(diff)
    }

    fn render_properties(&self, old: Option<&Side>, new: &Side) -> crate::repos::Result<String> {
        let before = match old {
            Some(side) => self.repo.file_properties(&side.path, &side.at)?,
            None => Properties::new(),
        };
        let after = self.repo.file_properties(&new.path, &new.at)?;

        Ok(property_changes(&before, &after))
    }

    fn content(&self, side: Option<&Side>) -> crate::repos::Result<Vec<u8>> {
        match side {
            Some(side) => self.repo.file_bytes(&side.path, &side.at),
            None => Ok(Vec::new()),
        }
    }

    fn binary_mime_type(&self, old: Option<&Side>, new: Option<&Side>) -> bool {
        [new, old].into_iter().flatten().any(|side| {
            match self.repo.file_properties(&side.path, &side.at) {
                Ok(props) => props
                    .get("svn:mime-type")
                    .is_some_and(|mime_type| is_binary_mime_type(mime_type)),
                Err(err) => {
                    debug!("no properties for {}: {err}", side.path);
                    false
                }
            }
        })
    }
}

impl Iterator for DiffSection<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.blocks.pop_front()?;
        Some(self.render(block))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.blocks.len(), Some(self.blocks.len()))
    }
}

/// Render property differences between two property mappings.
///
/// Unchanged properties are left out.
pub fn property_changes(before: &Properties, after: &Properties) -> String {
    let mut text = String::new();
    let names = before.keys().chain(after.keys()).collect::<BTreeSet<_>>();
    for name in names {
        match (before.get(name), after.get(name)) {
            (None, Some(new)) => {
                text.push_str(&format!("Added: {name}\n"));
                push_values(&mut text, "   + ", new);
            }
            (Some(old), None) => {
                text.push_str(&format!("Deleted: {name}\n"));
                push_values(&mut text, "   - ", old);
            }
            (Some(old), Some(new)) if old != new => {
                text.push_str(&format!("Modified: {name}\n"));
                push_values(&mut text, "   - ", old);
                push_values(&mut text, "   + ", new);
            }
            _ => {}
        }
    }

    text
}

fn push_values(text: &mut String, prefix: &str, value: &str) {
    if value.is_empty() {
        text.push_str(prefix.trim_end());
        text.push('\n');
        return;
    }

    for line in value.lines() {
        text.push_str(prefix);
        text.push_str(line);
        text.push('\n');
    }
}
