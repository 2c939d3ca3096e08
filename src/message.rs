// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Message rendering.
//!
//! Turns one [`GroupMatch`] into one [`Message`]: subject, ordered headers,
//! a body made of prologue, optional lazy diff section, and epilogue, plus
//! the transport that should carry it. Every parameter is resolved through
//! [`Config::get`] for the matched group, with the match's captures and the
//! event's identity visible to placeholder expansion.
//!
//! # See Also
//!
//! - [`diff`]
//! - [`crate::deliver`]

pub mod diff;
pub mod text;

pub use diff::DiffSection;

use crate::{
    collect::{CommitData, EventData, LockData, PropChangeData},
    config::{
        expand,
        params::{DiffKind, DiffKinds, LogEncoding, Positive, ShowNonmatching, TRUNCATE_SUBJECT},
        Config, Environment, GroupKey,
    },
    deliver::Transport,
    event::{Event, Mode, PropAction},
    repos::{Action, ChangeRecord, Location, Repository},
    route::GroupMatch,
};
use text::{decode_log, first_line, indent, truncate};

use chrono::{DateTime, FixedOffset, Local};
use std::{
    io::{self, Write},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Body timestamp layout, e.g., `2024-01-02 10:20:30 +0000 (Tue, 02 Jan 2024)`.
const BODY_DATE: &str = "%Y-%m-%d %H:%M:%S %z (%a, %d %b %Y)";

/// Rendered notification for a single group match.
///
/// Consumed exactly once by writing it out.
pub struct Message<'r> {
    pub group: GroupKey,
    pub from: String,

    /// Recipient addresses, never empty.
    pub to: Vec<String>,
    pub subject: String,

    /// Header fields in output order.
    pub headers: Vec<(String, String)>,
    pub prologue: String,
    pub diff: Option<DiffSection<'r>>,
    pub epilogue: String,
    pub transport: Transport,
}

impl Message<'_> {
    /// Lookup header field value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Write headers and body, pulling diff blocks as they are needed.
    ///
    /// # Errors
    ///
    /// - Return [`io::Error`] if writer fails.
    pub fn write_to<W: Write + ?Sized>(self, out: &mut W) -> io::Result<()> {
        for (name, value) in &self.headers {
            writeln!(out, "{name}: {value}")?;
        }
        writeln!(out)?;
        out.write_all(self.prologue.as_bytes())?;
        if let Some(diff) = self.diff {
            for chunk in diff {
                out.write_all(chunk.as_bytes())?;
            }
        }
        out.write_all(self.epilogue.as_bytes())?;

        Ok(())
    }

    /// Render whole message into memory.
    ///
    /// # Errors
    ///
    /// - Return [`io::Error`] if rendering fails.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }
}

/// Builds messages for the group matches of one event.
pub struct MessageBuilder<'a, 'r> {
    config: &'a Config,
    event: &'a Event,
    data: &'a EventData,
    repo: &'r dyn Repository,
    force_stdout: bool,
}

impl<'a, 'r> MessageBuilder<'a, 'r> {
    pub fn new(
        config: &'a Config,
        event: &'a Event,
        data: &'a EventData,
        repo: &'r dyn Repository,
    ) -> Self {
        Self {
            config,
            event,
            data,
            repo,
            force_stdout: false,
        }
    }

    /// Send every message to standard output, whatever the configuration
    /// says.
    pub fn force_stdout(mut self, force: bool) -> Self {
        self.force_stdout = force;
        self
    }

    /// Build message for group match.
    ///
    /// # Errors
    ///
    /// - Return [`MessageError::NoRecipients`] if `to_addr` resolves to
    ///   nothing for the group.
    #[instrument(skip(self, found), fields(group = %found.group), level = "debug")]
    pub fn build(&self, found: &GroupMatch) -> Result<Message<'r>> {
        let group = &found.group;
        let env = self.environment(found);

        let to = parse_addresses(&self.config.get_or_empty("to_addr", group, &env));
        if to.is_empty() {
            return Err(MessageError::NoRecipients {
                group: group.clone(),
            });
        }
        let from = self
            .param("from_addr", group, &env)
            .or_else(|| self.data.author().map(str::to_string))
            .unwrap_or_else(|| "svn".into());

        let subject = self.subject(found, &env);
        let headers = self.headers(found, &env, &from, &to, &subject);
        let (prologue, diff, epilogue) = match self.data {
            EventData::Commit(data) => self.commit_body(data, found, &env),
            EventData::PropChange(data) => (self.propchange_body(data), None, String::new()),
            EventData::Lock(data) => (self.lock_body(data, found), None, String::new()),
        };
        let transport = Transport::select(self.config, group, &env, self.force_stdout);
        debug!("message for {group} goes to {} by {}", to.join(", "), transport.kind());

        Ok(Message {
            group: group.clone(),
            from,
            to,
            subject,
            headers,
            prologue,
            diff,
            epilogue,
            transport,
        })
    }

    fn environment(&self, found: &GroupMatch) -> Environment {
        let mut env = Environment::new();
        env.set("author", self.data.author().unwrap_or_default())
            .set("repos_basename", self.event.repos_basename.as_str())
            .set("repos", self.event.repos_path.display().to_string());
        if let Some(revision) = self.revision() {
            env.set("revision", revision.as_str()).set("rev", revision);
        }
        if let Some(propname) = &self.event.propname {
            env.set("propname", propname.as_str());
        }
        env.extend(&found.captures);
        env
    }

    /// Resolve parameter, treating blank values as unset.
    fn param(&self, name: &str, group: &GroupKey, env: &Environment) -> Option<String> {
        self.config
            .get(name, group, env)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T>(&self, name: &str, group: &GroupKey, env: &Environment) -> T
    where
        T: FromStr<Err = String> + Default,
    {
        self.config.get_parsed(name, group, env).unwrap_or_default()
    }

    fn revision(&self) -> Option<String> {
        match self.data {
            EventData::Commit(data) => match &data.location {
                Location::Revision(rev) => Some(rev.to_string()),
                Location::Transaction(txn) => Some(txn.clone()),
            },
            EventData::PropChange(data) => Some(data.revision.to_string()),
            EventData::Lock(_) => None,
        }
    }

    fn author(&self) -> &str {
        self.data.author().unwrap_or("(no author)")
    }

    fn subject(&self, found: &GroupMatch, env: &Environment) -> String {
        let group = &found.group;
        let prefix = self
            .param(&format!("{}_subject_prefix", self.event.mode), group, env)
            .or_else(|| self.param("subject_prefix", group, env))
            .unwrap_or_default();

        let summary = match self.data {
            EventData::Commit(data) => {
                let at = match &data.location {
                    Location::Revision(rev) => format!("r{rev}"),
                    Location::Transaction(txn) => format!("txn {txn}"),
                };
                let log = decode_log(&data.log, self.log_encoding(group, env));
                match first_line(&log) {
                    "" => at,
                    line => format!("{at}: {line}"),
                }
            }
            EventData::PropChange(data) => {
                format!("propchange r{}: {}", data.revision, data.propname)
            }
            EventData::Lock(data) => {
                let paths = found.paths.iter().cloned().collect::<Vec<_>>();
                format!("{}: {}", data.action, paths.join(", "))
            }
        };

        let subject = match prefix.is_empty() {
            true => summary,
            false => format!("{prefix} {summary}"),
        };
        match self.config.get_parsed::<Positive>(TRUNCATE_SUBJECT, group, env) {
            Some(Positive(limit)) => truncate(&subject, usize::try_from(limit).unwrap_or(usize::MAX)),
            None => subject,
        }
    }

    fn headers(
        &self,
        found: &GroupMatch,
        env: &Environment,
        from: &str,
        to: &[String],
        subject: &str,
    ) -> Vec<(String, String)> {
        let date = match self.data.timestamp() {
            Some(timestamp) => timestamp.to_rfc2822(),
            None => Local::now().to_rfc2822(),
        };

        let mut headers = vec![
            ("From".to_string(), one_line(from)),
            ("To".to_string(), to.join(", ")),
        ];
        if let Some(reply_to) = self.param("reply_to", &found.group, env) {
            headers.push(("Reply-To".into(), one_line(&reply_to)));
        }
        headers.extend([
            ("Subject".to_string(), one_line(subject)),
            ("Date".to_string(), date),
            ("MIME-Version".to_string(), "1.0".to_string()),
            (
                "Content-Type".to_string(),
                "text/plain; charset=UTF-8".to_string(),
            ),
            ("Content-Transfer-Encoding".to_string(), "8bit".to_string()),
            ("X-Svn-Commit-Project".to_string(), found.group.to_string()),
            ("X-Svn-Commit-Author".to_string(), one_line(self.author())),
        ]);
        if let Some(revision) = self.revision() {
            headers.push(("X-Svn-Commit-Revision".into(), revision));
        }
        headers.push((
            "X-Svn-Commit-Repository".into(),
            self.event.repos_basename.clone(),
        ));

        headers
    }

    fn log_encoding(&self, group: &GroupKey, env: &Environment) -> LogEncoding {
        self.parsed("log_encoding", group, env)
    }

    fn commit_body(
        &self,
        data: &CommitData,
        found: &GroupMatch,
        env: &Environment,
    ) -> (String, Option<DiffSection<'r>>, String) {
        let group = &found.group;
        let show: ShowNonmatching = self.parsed("show_nonmatching_paths", group, env);
        let (mine, others): (Vec<&ChangeRecord>, Vec<&ChangeRecord>) = data
            .changes
            .iter()
            .partition(|record| found.paths.contains(&record.path));

        let mut body = String::new();
        self.identity(&mut body, data.timestamp);
        body.push_str(&match &data.location {
            Location::Revision(rev) => format!("New Revision: {rev}\n"),
            Location::Transaction(txn) => format!("Transaction: {txn}\n"),
        });
        if let Some(url) = self.param("commit_url", group, env) {
            body.push_str(&format!("URL: {url}\n"));
        }

        let log = decode_log(&data.log, self.log_encoding(group, env));
        body.push_str(&format!("\nLog:\n{}\n", log.trim_end()));
        push_change_lists(&mut body, &mine);
        if show != ShowNonmatching::No && !others.is_empty() {
            body.push_str("\nChanges in other areas also in this revision:\n");
            push_change_lists(&mut body, &others);
        }
        body.push('\n');

        let diff = self.commit_diff(data, found, env, &mine, &others, show);
        let epilogue = self
            .param("revision_url", group, env)
            .map(|url| format!("Revision URL: {url}\n"))
            .unwrap_or_default();

        (body, diff, epilogue)
    }

    fn commit_diff(
        &self,
        data: &CommitData,
        found: &GroupMatch,
        env: &Environment,
        mine: &[&ChangeRecord],
        others: &[&ChangeRecord],
        show: ShowNonmatching,
    ) -> Option<DiffSection<'r>> {
        let group = &found.group;
        let kinds: DiffKinds = self.parsed("generate_diffs", group, env);
        if kinds.is_empty() {
            return None;
        }

        let marker = |kind: DiffKind, record: &ChangeRecord| -> Option<String> {
            let param = kind.template_param();
            let mut env = env.clone();
            env.set("path", record.path.as_str());
            if let Some((path, rev)) = record.copy_source() {
                env.set("base_path", path).set("base_rev", rev.to_string());
            }

            match self.config.get_raw(param, group) {
                Some(raw) if raw.trim().is_empty() => None,
                Some(_) => self.config.get(param, group, &env),
                None => Some(expand(kind.default_template(), &env).text),
            }
        };

        let mut diff = DiffSection::new(self.repo, data.location.clone(), data.base_revision);
        for record in mine {
            diff.push_record(record, &kinds, &marker);
        }

        if show == ShowNonmatching::Yes {
            let mut extra = DiffSection::new(self.repo, data.location.clone(), data.base_revision);
            for record in others {
                extra.push_record(record, &kinds, &marker);
            }
            if !extra.is_empty() {
                diff.push_heading("Diffs of changes in other areas also in this revision:");
                diff.append(extra);
            }
        }

        Some(diff).filter(|diff| !diff.is_empty())
    }

    fn propchange_body(&self, data: &PropChangeData) -> String {
        let mut body = String::new();
        self.identity(&mut body, data.timestamp);
        body.push_str(&format!("Revision: {}\n", data.revision));
        body.push_str(&format!("Property Name: {}\n", data.propname));
        body.push_str(&format!(
            "\nProperty '{}' was {}\n\n",
            data.propname,
            data.action.as_str()
        ));

        if data.action != PropAction::Added {
            body.push_str("Old value:\n");
            body.push_str(&indent(data.old_value.as_deref().unwrap_or_default(), "   "));
        }
        if data.action != PropAction::Deleted {
            body.push_str("New value:\n");
            body.push_str(&indent(data.new_value.as_deref().unwrap_or_default(), "   "));
        }

        body
    }

    fn lock_body(&self, data: &LockData, found: &GroupMatch) -> String {
        let mut body = String::new();
        self.identity(&mut body, None);
        let heading = match data.action {
            Mode::Unlock => "Unlocked",
            _ => "Locked",
        };
        body.push_str(&format!("\n{heading}:\n"));
        for path in &found.paths {
            body.push_str(&format!("   {path}\n"));
        }

        body
    }

    fn identity(&self, body: &mut String, timestamp: Option<DateTime<FixedOffset>>) {
        body.push_str(&format!("Author: {}\n", self.author()));
        if let Some(timestamp) = timestamp {
            body.push_str(&format!("Date: {}\n", timestamp.format(BODY_DATE)));
        }
    }
}

fn push_change_lists(body: &mut String, records: &[&ChangeRecord]) {
    let lists: [(&str, fn(&ChangeRecord) -> bool); 6] = [
        ("Added", |record| record.action == Action::Added),
        ("Copied", |record| record.action == Action::Copied),
        ("Replaced", |record| record.action == Action::Replaced),
        ("Deleted", |record| record.action == Action::Deleted),
        ("Modified", |record| match record.action {
            Action::Modified => record.text_changed || !record.props_changed,
            Action::Copied => record.text_changed,
            _ => false,
        }),
        ("Property changes", |record| {
            record.props_changed && matches!(record.action, Action::Modified | Action::Copied)
        }),
    ];

    for (heading, wanted) in lists {
        let mut entries = records.iter().filter(|record| wanted(record)).peekable();
        if entries.peek().is_none() {
            continue;
        }

        body.push_str(&format!("\n{heading}:\n"));
        for record in entries {
            let suffix = if record.is_dir() { "/" } else { "" };
            body.push_str(&match record.copy_source() {
                Some((path, rev)) if record.action == Action::Copied => {
                    format!("   {}{suffix} (copied from r{rev}, {path})\n", record.path)
                }
                _ => format!("   {}{suffix}\n", record.path),
            });
        }
    }
}

/// Split address list on commas, or on whitespace when no address carries
/// a display name.
pub fn parse_addresses(list: &str) -> Vec<String> {
    let pieces = list
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty());

    pieces
        .flat_map(|piece| match piece.contains('<') {
            true => vec![piece.to_string()],
            false => piece.split_whitespace().map(str::to_string).collect(),
        })
        .collect()
}

fn one_line(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_header<'h>(headers: &'h [(String, String)], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Message recovered from its written form.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RenderedMessage {
    /// Parse written message back into headers and body.
    ///
    /// Folded header lines are joined with a single space.
    ///
    /// # Errors
    ///
    /// - Return [`MessageError::Malformed`] if a header line has no colon,
    ///   or the blank line ending the header block is missing.
    pub fn parse(text: &str) -> Result<Self> {
        let (head, body) = text
            .split_once("\n\n")
            .ok_or_else(|| MessageError::Malformed {
                line: text.lines().count(),
                reason: "missing end of header block".into(),
            })?;

        let mut headers: Vec<(String, String)> = Vec::new();
        for (index, line) in head.lines().enumerate() {
            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = headers.last_mut() else {
                    return Err(MessageError::Malformed {
                        line: index + 1,
                        reason: "continuation before first header".into(),
                    });
                };
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| MessageError::Malformed {
                line: index + 1,
                reason: format!("expected header field, found {line:?}"),
            })?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self {
            headers,
            body: body.to_string(),
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }
}

impl FromStr for RenderedMessage {
    type Err = MessageError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::parse(data)
    }
}

/// Message rendering error types.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// Group resolves no `to_addr`.
    #[error("group {group} has no recipients")]
    NoRecipients { group: GroupKey },

    /// Written message cannot be parsed back.
    #[error("malformed message at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Friendly result alias :3
pub type Result<T, E = MessageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collect::collect,
        repos::{
            fixture::{record, Fixture},
            NodeKind,
        },
        route::route,
    };
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = indoc! {r#"
        [ALL]
        for_paths = .*
        to_addr = dev@example.org
        from_addr = svn@example.org
        subject_prefix = [svn]
    "#};

    fn single_commit() -> Fixture {
        Fixture::default()
            .commit(41, "bob", "Import")
            .commit(42, "alice", "Fix typo\n\nLonger explanation.\n")
            .change(42, record("/trunk/README", Action::Modified))
            .file("/trunk/README", 41, b"Hello\nFix typo\n")
            .file("/trunk/README", 42, b"Hello\nFixed typo\n")
    }

    fn render(config: &Config, event: &Event, repo: &dyn Repository) -> Vec<RenderedMessage> {
        let data = collect(repo, event).unwrap();
        let builder = MessageBuilder::new(config, event, &data, repo).force_stdout(true);
        route(config, &event.repos_basename, &data.routed_paths(), event.propname.as_deref())
            .iter()
            .map(|found| {
                let bytes = builder.build(found).unwrap().into_bytes().unwrap();
                String::from_utf8(bytes).unwrap().parse::<RenderedMessage>().unwrap()
            })
            .collect()
    }

    #[test]
    fn plain_single_path_commit() -> anyhow::Result<()> {
        let config: Config = CONFIG.parse()?;
        let repo = single_commit();
        let event = Event::commit("/srv/svn/asf", "42")?;

        let messages = render(&config, &event, &repo);
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.subject(), Some("[svn] r42: Fix typo"));
        assert_eq!(message.header("To"), Some("dev@example.org"));
        assert_eq!(message.header("From"), Some("svn@example.org"));
        assert_eq!(message.header("X-Svn-Commit-Revision"), Some("42"));
        assert!(message
            .header("Date")
            .is_some_and(|date| date.ends_with("Jan 2024 10:20:30 +0000")));

        let expect = indoc! {"
            Author: alice
            Date: 2024-01-02 10:20:30 +0000 (Tue, 02 Jan 2024)
            New Revision: 42

            Log:
            Fix typo

            Longer explanation.

            Modified:
               /trunk/README

            Modified: /trunk/README
            ==============================================================================
            --- /trunk/README\t(r41)
            +++ /trunk/README\t(r42)
            @@ -1,2 +1,2 @@
             Hello
            -Fix typo
            +Fixed typo

        "};
        assert_eq!(message.body, expect);

        Ok(())
    }

    #[test]
    fn header_order() -> anyhow::Result<()> {
        let config: Config = format!("{CONFIG}reply_to = dev@example.org\n").parse()?;
        let repo = single_commit();
        let event = Event::commit("/srv/svn/asf", "42")?;

        let messages = render(&config, &event, &repo);
        let names = messages[0]
            .headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        let expect = vec![
            "From",
            "To",
            "Reply-To",
            "Subject",
            "Date",
            "MIME-Version",
            "Content-Type",
            "Content-Transfer-Encoding",
            "X-Svn-Commit-Project",
            "X-Svn-Commit-Author",
            "X-Svn-Commit-Revision",
            "X-Svn-Commit-Repository",
        ];
        assert_eq!(names, expect);

        Ok(())
    }

    #[test]
    fn empty_log_gives_bare_revision() -> anyhow::Result<()> {
        let config: Config = CONFIG.parse()?;
        let repo = Fixture::default()
            .commit(1, "alice", "")
            .change(1, record("/trunk", Action::Added));
        let event = Event::commit("/srv/svn/asf", "1")?;

        let messages = render(&config, &event, &repo);
        assert_eq!(messages[0].subject(), Some("[svn] r1"));

        Ok(())
    }

    #[test]
    fn copied_file_listed_as_modified_only_when_edited() -> anyhow::Result<()> {
        let config: Config = format!("{CONFIG}generate_diffs =\n").parse()?;
        let copy = |path: &str, edited: bool| ChangeRecord {
            copy_source_path: Some("/trunk/old.c".into()),
            copy_source_revision: Some(1),
            text_changed: edited,
            ..record(path, Action::Copied)
        };
        let repo = Fixture::default()
            .commit(1, "alice", "Base")
            .commit(2, "alice", "Copy")
            .change(2, copy("/trunk/new.c", true))
            .change(2, copy("/trunk/twin.c", false));
        let event = Event::commit("/srv/svn/asf", "2")?;

        let body = &render(&config, &event, &repo)[0].body;
        let expect = indoc! {"
            Author: alice
            Date: 2024-01-02 10:20:30 +0000 (Tue, 02 Jan 2024)
            New Revision: 2

            Log:
            Copy

            Copied:
               /trunk/new.c (copied from r1, /trunk/old.c)
               /trunk/twin.c (copied from r1, /trunk/old.c)

            Modified:
               /trunk/new.c

        "};
        assert_eq!(body, expect);

        Ok(())
    }

    #[test]
    fn directory_property_change_listed_without_diff() -> anyhow::Result<()> {
        let config: Config = CONFIG.parse()?;
        let trunk = ChangeRecord {
            kind: NodeKind::Directory,
            text_changed: false,
            props_changed: true,
            ..record("/trunk", Action::Modified)
        };
        let repo = Fixture::default()
            .commit(3, "alice", "Base")
            .commit(4, "alice", "Ignore objects")
            .change(4, trunk);
        let event = Event::commit("/srv/svn/asf", "4")?;

        let body = &render(&config, &event, &repo)[0].body;
        assert!(body.ends_with("\nLog:\nIgnore objects\n\nProperty changes:\n   /trunk/\n\n"));
        assert!(!body.contains("\nModified:\n"));
        assert!(!body.contains("====="));

        Ok(())
    }

    #[test]
    fn transaction_commit_uses_transaction_id() -> anyhow::Result<()> {
        let config: Config = CONFIG.parse()?;
        let repo = Fixture::default()
            .commit(7, "bob", "Base")
            .commit(u64::MAX, "carol", "Pending")
            .change(u64::MAX, record("/trunk/a.c", Action::Modified))
            .file("/trunk/a.c", 7, b"one\n")
            .file("/trunk/a.c", u64::MAX, b"two\n");
        let event = Event::commit("/srv/svn/asf", "7-1")?;

        let message = &render(&config, &event, &repo)[0];
        assert_eq!(message.subject(), Some("[svn] txn 7-1: Pending"));
        assert_eq!(message.header("X-Svn-Commit-Revision"), Some("7-1"));
        assert!(message.body.starts_with("Author: carol\nTransaction: 7-1\n\nLog:\nPending\n"));
        assert!(message.body.contains("--- /trunk/a.c\t(r7)\n+++ /trunk/a.c\t(txn 7-1)\n"));

        Ok(())
    }

    #[test]
    fn subject_truncation() -> anyhow::Result<()> {
        let config: Config = format!("{CONFIG}truncate_subject = 40\n").parse()?;
        let repo = Fixture::default()
            .commit(9, "alice", &"x".repeat(200))
            .change(9, record("/trunk/a", Action::Deleted));
        let event = Event::commit("/srv/svn/asf", "9")?;

        let messages = render(&config, &event, &repo);
        let subject = messages[0].subject().unwrap_or_default();
        assert_eq!(subject.chars().count(), 40);
        assert!(subject.ends_with(text::ELLIPSIS));

        Ok(())
    }

    #[test]
    fn propchange_shows_before_and_after() -> anyhow::Result<()> {
        let config: Config = CONFIG.parse()?;
        let repo = Fixture::default()
            .commit(5, "alice", "new msg")
            .change(5, record("/trunk/a", Action::Modified));
        let event = Event::propchange(
            "/srv/svn/asf",
            "5",
            "svn:log",
            PropAction::Modified,
            Some("old msg".into()),
        )?
        .with_author(Some("admin".into()));

        let messages = render(&config, &event, &repo);
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.subject(), Some("[svn] propchange r5: svn:log"));
        let expect = indoc! {"
            Author: admin
            Date: 2024-01-02 10:20:30 +0000 (Tue, 02 Jan 2024)
            Revision: 5
            Property Name: svn:log

            Property 'svn:log' was modified

            Old value:
               old msg
            New value:
               new msg
        "};
        assert_eq!(message.body, expect);
        assert!(!message.body.contains("@@"));

        Ok(())
    }

    #[test]
    fn nonmatching_paths_summary_and_full() -> anyhow::Result<()> {
        let repo = Fixture::default()
            .commit(6, "alice", "Touch both")
            .commit(7, "alice", "Touch both")
            .change(7, record("/docs/a.txt", Action::Modified))
            .change(7, record("/trunk/b.c", Action::Modified))
            .file("/docs/a.txt", 6, b"a\n")
            .file("/docs/a.txt", 7, b"A\n")
            .file("/trunk/b.c", 6, b"b\n")
            .file("/trunk/b.c", 7, b"B\n");
        let event = Event::commit("/srv/svn/asf", "7")?;
        let base = indoc! {r#"
            [DOCS]
            for_paths = ^/docs/
            to_addr = docs@example.org
        "#};

        let config: Config = format!("{base}show_nonmatching_paths = summary\n").parse()?;
        let body = &render(&config, &event, &repo)[0].body;
        assert!(body.contains("Changes in other areas also in this revision:\n\nModified:\n   /trunk/b.c\n"));
        assert!(!body.contains("+B"));

        let config: Config = format!("{base}show_nonmatching_paths = yes\n").parse()?;
        let body = &render(&config, &event, &repo)[0].body;
        assert!(body.contains("Diffs of changes in other areas also in this revision:\n"));
        assert!(body.contains("+B\n"));

        let config: Config = format!("{base}show_nonmatching_paths = no\n").parse()?;
        let body = &render(&config, &event, &repo)[0].body;
        assert!(!body.contains("/trunk/b.c"));

        Ok(())
    }

    #[test]
    fn custom_and_suppressed_diff_markers() -> anyhow::Result<()> {
        let repo = Fixture::default()
            .commit(2, "alice", "Add and change")
            .commit(3, "alice", "Add and change")
            .change(3, record("/trunk/new.c", Action::Added))
            .change(3, record("/trunk/old.c", Action::Modified))
            .file("/trunk/new.c", 3, b"int x;\n")
            .file("/trunk/old.c", 2, b"1\n")
            .file("/trunk/old.c", 3, b"2\n");
        let event = Event::commit("/srv/svn/asf", "3")?;
        let config: Config = format!(
            "{CONFIG}diff_add = New file %(path)s in r%(rev)s\ndiff_modify =\n"
        )
        .parse()?;

        let body = &render(&config, &event, &repo)[0].body;
        assert!(body.contains("New file /trunk/new.c in r3\n"));
        assert!(!body.contains("Modified: /trunk/old.c\n"));
        assert!(!body.contains("-1\n"));

        Ok(())
    }

    #[test]
    fn no_recipients_is_an_error() -> anyhow::Result<()> {
        let config: Config = "[quiet]\nfor_paths = .*\n".parse()?;
        let repo = single_commit();
        let event = Event::commit("/srv/svn/asf", "42")?;
        let data = collect(&repo, &event)?;
        let found = GroupMatch {
            group: GroupKey::Named("quiet".into()),
            captures: Default::default(),
            paths: ["/trunk/README".to_string()].into(),
        };

        let result = MessageBuilder::new(&config, &event, &data, &repo).build(&found);
        assert!(matches!(result, Err(MessageError::NoRecipients { .. })));

        Ok(())
    }

    #[test]
    fn parse_addresses_with_display_names() {
        assert_eq!(
            parse_addresses("a@example.org b@example.org"),
            vec!["a@example.org".to_string(), "b@example.org".to_string()]
        );
        assert_eq!(
            parse_addresses("Alice <a@example.org>, b@example.org"),
            vec!["Alice <a@example.org>".to_string(), "b@example.org".to_string()]
        );
    }

    #[test]
    fn parse_rendered_message() -> anyhow::Result<()> {
        let text = "Subject: long\n  folded\nTo: x@example.org\n\nbody\n\nmore\n";
        let result: RenderedMessage = text.parse()?;
        assert_eq!(result.subject(), Some("long folded"));
        assert_eq!(result.body, "body\n\nmore\n");
        assert!("no header block".parse::<RenderedMessage>().is_err());

        Ok(())
    }
}
