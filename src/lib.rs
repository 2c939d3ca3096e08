// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Commit notification mailer for repository hooks.
//!
//! Invoked from post-commit, post-revprop-change, post-lock, and post-unlock
//! hooks, the mailer works out which configured __groups__ care about an
//! event, renders one message per group, and hands each message to SMTP, a
//! mail command, an mbox file, or standard output.
//!
//! The pipeline runs in one direction:
//!
//! 1. [`event`] records what the hook was invoked for.
//! 2. [`config`] loads the group definitions and their parameters.
//! 3. [`collect`] pulls author, log, and changed paths out of the repository
//!    through the [`repos::Repository`] adapter.
//! 4. [`route`] buckets changed paths by group.
//! 5. [`message`] renders each bucket.
//! 6. [`deliver`] sends each message.
//!
//! [`hook`] drives the whole thing and maps failures to exit codes.

pub mod collect;
pub mod config;
pub mod deliver;
pub mod event;
pub mod hook;
pub mod message;
pub mod path;
pub mod repos;
pub mod route;

pub use config::{Config, ConfigError, GroupKey};
pub use event::{Event, Mode};
pub use hook::{Hook, HookError, Invocation};
pub use repos::{Repository, Svnlook};
