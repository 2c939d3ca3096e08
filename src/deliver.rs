// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Message delivery.
//!
//! Each message carries the [`Transport`] picked for its group. Selection
//! falls through SMTP, a pipe to a mail command, an mbox file, and finally
//! standard output, taking the first one the group's parameters configure.
//!
//! A [`Sink`] hands messages to their transport. A failed delivery is logged
//! and counted, but never stops the sink from trying the next message.
//!
//! # See Also
//!
//! - [`smtp`]
//! - [`pipe`]
//! - [`mbox`]

pub mod mbox;
pub mod pipe;
pub mod smtp;

pub use mbox::LockError;
pub use smtp::SmtpSettings;

use crate::{
    config::{
        params::{Positive, SmtpSecurity},
        Config, Environment, GroupKey,
    },
    message::Message,
    path::expand_path,
};

use std::{
    error::Error as StdError,
    io::{self, Write},
    path::PathBuf,
    process::ExitStatus,
    time::Duration,
};
use tracing::{error, info, instrument, warn};

/// Seconds to wait on an unresponsive SMTP server.
pub const DEFAULT_SMTP_TIMEOUT: u64 = 60;

/// Way a message leaves the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Smtp(SmtpSettings),

    /// Command words, recipients get appended as extra arguments.
    Pipe(Vec<String>),
    Mbox(PathBuf),
    Stdout,
}

impl Transport {
    /// Pick transport from group parameters.
    ///
    /// `smtp_hostname` selects SMTP, then `mail_command` selects a pipe, then
    /// `mbox_path` selects an mbox file. Without any of those, or when
    /// `force_stdout` is set, messages go to standard output.
    pub fn select(config: &Config, group: &GroupKey, env: &Environment, force_stdout: bool) -> Self {
        if force_stdout {
            return Self::Stdout;
        }

        let param = |name: &str| {
            config
                .get(name, group, env)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(hostname) = param("smtp_hostname") {
            let port = param("smtp_port").and_then(|port| match port.parse() {
                Ok(port) => Some(port),
                Err(err) => {
                    warn!("group {group}: ignoring smtp_port {port:?}: {err}");
                    None
                }
            });
            let timeout = config
                .get_parsed::<Positive>("smtp_timeout", group, env)
                .map_or(DEFAULT_SMTP_TIMEOUT, |Positive(secs)| secs);

            return Self::Smtp(SmtpSettings {
                hostname,
                port,
                username: param("smtp_username"),
                password: param("smtp_password"),
                security: config
                    .get_parsed::<SmtpSecurity>("smtp_use_ssl", group, env)
                    .unwrap_or_default(),
                timeout: Duration::from_secs(timeout),
            });
        }

        if let Some(command) = param("mail_command") {
            return Self::Pipe(command.split_whitespace().map(str::to_string).collect());
        }

        if let Some(path) = param("mbox_path") {
            let path = expand_path(&path).unwrap_or_else(|err| {
                warn!("group {group}: using mbox_path as written: {err}");
                PathBuf::from(path)
            });
            return Self::Mbox(path);
        }

        Self::Stdout
    }

    /// Short transport name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::Pipe(_) => "pipe",
            Self::Mbox(_) => "mbox",
            Self::Stdout => "stdout",
        }
    }
}

/// Tally of delivery attempts.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub delivered: usize,
    pub failed: usize,
}

impl Report {
    /// Check if there were attempts, and every one of them failed.
    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.delivered == 0
    }
}

/// Delivers messages to their transports.
///
/// Standard output is injected, so callers can capture it.
#[derive(Debug)]
pub struct Sink<W: Write> {
    stdout: W,
    report: Report,
}

impl<W: Write> Sink<W> {
    pub fn new(stdout: W) -> Self {
        Self {
            stdout,
            report: Report::default(),
        }
    }

    /// Deliver message, logging and counting the outcome.
    pub fn send(&mut self, message: Message<'_>) {
        let group = message.group.clone();
        let kind = message.transport.kind();
        match self.deliver(message) {
            Ok(()) => {
                info!("group {group}: delivered by {kind}");
                self.report.delivered += 1;
            }
            Err(err) => {
                error!("group {group}: {kind} delivery failed: {}", causes(&err));
                self.report.failed += 1;
            }
        }
    }

    /// Deliver message through its transport.
    ///
    /// # Errors
    ///
    /// - Return [`DeliveryError`] if transport fails.
    #[instrument(skip(self, message), fields(group = %message.group), level = "debug")]
    pub fn deliver(&mut self, message: Message<'_>) -> Result<()> {
        match message.transport.clone() {
            Transport::Smtp(settings) => {
                let from = message.from.clone();
                let to = message.to.clone();
                let bytes = message.into_bytes().map_err(DeliveryError::Render)?;
                smtp::send(&settings, &from, &to, &bytes)
            }
            Transport::Pipe(command) => pipe::send(&command, message),
            Transport::Mbox(path) => mbox::append(&path, message),
            Transport::Stdout => {
                message
                    .write_to(&mut self.stdout)
                    .and_then(|_| writeln!(self.stdout))
                    .and_then(|_| self.stdout.flush())
                    .map_err(DeliveryError::Stdout)
            }
        }
    }

    pub fn report(&self) -> Report {
        self.report
    }

    pub fn into_inner(self) -> W {
        self.stdout
    }
}

/// Join error with all of its sources into one line.
pub fn causes(err: &dyn StdError) -> String {
    let mut line = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        line.push_str(": ");
        line.push_str(&cause.to_string());
        source = cause.source();
    }

    line
}

/// Delivery error types.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Message cannot be rendered for sending.
    #[error("failed to render message")]
    Render(#[source] io::Error),

    /// Address cannot be used in an SMTP envelope.
    #[error("invalid address {address:?}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    /// SMTP envelope cannot be built, e.g., no recipients.
    #[error("invalid envelope")]
    Envelope(#[source] lettre::error::Error),

    /// SMTP exchange fails.
    #[error("smtp server {host} rejected message")]
    Smtp {
        host: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },

    /// Mail command is blank.
    #[error("mail command is empty")]
    EmptyCommand,

    /// Mail command cannot be spawned.
    #[error("failed to run mail command {command}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Mail command cannot be fed, or waited on.
    #[error("failed to feed mail command {command}")]
    Feed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Mail command exits with failure.
    #[error("mail command {command} failed with {status}: {stderr}")]
    Command {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Mbox file cannot be written.
    #[error("failed to append to mbox {path:?}")]
    Mbox {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Mbox file cannot be locked.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Standard output cannot be written.
    #[error("failed to write message to stdout")]
    Stdout(#[source] io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = DeliveryError> = std::result::Result<T, E>;
