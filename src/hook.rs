// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hook driver.
//!
//! Ties the pipeline together for one invocation: build the event, load the
//! configuration, open the repository, collect, route, render, and deliver.
//! Every failure maps to a process exit code:
//!
//! - `0` when everything went fine, including when no group matched.
//! - `1` when the repository cannot be read, or every delivery failed.
//! - `2` when arguments, input, or configuration are bad.

use crate::{
    collect::collect,
    config::{Config, ConfigError},
    deliver::{causes, Report, Sink},
    event::{Event, EventError, Mode, PropAction},
    message::MessageBuilder,
    path::{resolve_config_path, PathError, CONFIG_ENV},
    repos::{Repository, RepositoryError, Svnlook},
    route::route,
};

use std::{
    env,
    io::{self, BufRead, BufReader, Read, Write},
    path::PathBuf,
};
use tracing::{error, info, instrument, warn};

/// Exit code of a successful run.
pub const EXIT_OK: i32 = 0;

/// Exit code for repository failure, or total delivery failure.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for bad arguments, input, or configuration.
pub const EXIT_USAGE: i32 = 2;

/// Arguments of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub mode: Mode,
    pub repos_path: PathBuf,

    /// Revision, transaction, or lock owner.
    pub id: String,
    pub propname: Option<String>,
    pub action: Option<String>,
    pub config: Option<PathBuf>,
    pub author: Option<String>,
    pub force_stdout: bool,
}

impl Invocation {
    /// Build event of invocation.
    ///
    /// Property changes read the old value from `stdin`, and locks read one
    /// path per line from it. Commits never touch `stdin`.
    ///
    /// # Errors
    ///
    /// - Return [`HookError::Event`] if arguments do not form an event.
    /// - Return [`HookError::Stdin`] if standard input cannot be read.
    pub fn event(&self, stdin: impl Read) -> Result<Event> {
        let event = match self.mode {
            Mode::Commit => Event::commit(&self.repos_path, &self.id)?,
            Mode::PropChange => {
                let (Some(propname), Some(action)) = (&self.propname, &self.action) else {
                    return Err(EventError::MissingPropArgs.into());
                };
                let action: PropAction = action.parse()?;
                let old_value = match action {
                    PropAction::Added => None,
                    _ => {
                        let mut raw = Vec::new();
                        BufReader::new(stdin)
                            .read_to_end(&mut raw)
                            .map_err(HookError::Stdin)?;
                        Some(String::from_utf8_lossy(&raw).into_owned())
                    }
                };
                Event::propchange(&self.repos_path, &self.id, propname, action, old_value)?
            }
            Mode::Lock | Mode::Unlock => {
                let paths = BufReader::new(stdin)
                    .lines()
                    .collect::<io::Result<Vec<_>>>()
                    .map_err(HookError::Stdin)?;
                Event::lock(&self.repos_path, self.mode, &self.id, paths)?
            }
        };

        Ok(event.with_author(self.author.clone()))
    }
}

/// Mail notification run over a loaded configuration.
#[derive(Debug)]
pub struct Hook {
    config: Config,
    event: Event,
    force_stdout: bool,
}

impl Hook {
    pub fn new(config: Config, event: Event) -> Self {
        Self {
            config,
            event,
            force_stdout: false,
        }
    }

    pub fn force_stdout(mut self, force: bool) -> Self {
        self.force_stdout = force;
        self
    }

    /// Collect, route, render, and deliver every message of the event.
    ///
    /// Groups without recipients are skipped with a warning. Delivery
    /// failures are counted in the returned report.
    ///
    /// # Errors
    ///
    /// - Return [`HookError::Repository`] if collection fails.
    #[instrument(skip(self, repo, sink), fields(mode = %self.event.mode), level = "debug")]
    pub fn run<W: Write>(&self, repo: &dyn Repository, sink: &mut Sink<W>) -> Result<Report> {
        let data = collect(repo, &self.event)?;
        let matches = route(
            &self.config,
            &self.event.repos_basename,
            &data.routed_paths(),
            self.event.propname.as_deref(),
        );
        if matches.is_empty() {
            info!("no group matched, nothing to send");
        }

        let builder = MessageBuilder::new(&self.config, &self.event, &data, repo)
            .force_stdout(self.force_stdout);
        for found in &matches {
            match builder.build(found) {
                Ok(message) => sink.send(message),
                Err(err) => warn!("skipping group {}: {err}", found.group),
            }
        }

        Ok(sink.report())
    }
}

/// Run hook invocation to completion, returning the process exit code.
pub fn run(invocation: Invocation, stdin: impl Read, stdout: impl Write) -> i32 {
    match try_run(&invocation, stdin, stdout) {
        Ok(report) => {
            info!(
                "{} delivered, {} failed",
                report.delivered, report.failed
            );
            EXIT_OK
        }
        Err(err) => {
            error!("{}", causes(&err));
            err.exit_code()
        }
    }
}

fn try_run(invocation: &Invocation, stdin: impl Read, stdout: impl Write) -> Result<Report> {
    let event = invocation.event(stdin)?;
    let path = resolve_config_path(
        env::var_os(CONFIG_ENV),
        invocation.config.clone(),
        &invocation.repos_path,
    )?;
    let config = Config::load(path)?;
    let repo = Svnlook::open(&invocation.repos_path)?;

    let mut sink = Sink::new(stdout);
    let report = Hook::new(config, event)
        .force_stdout(invocation.force_stdout)
        .run(&repo, &mut sink)?;
    if report.all_failed() {
        return Err(HookError::AllDeliveriesFailed(report.failed));
    }

    Ok(report)
}

/// Hook error types.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error("failed to read standard input")]
    Stdin(#[source] io::Error),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("all {0} deliveries failed")]
    AllDeliveriesFailed(usize),
}

impl HookError {
    /// Process exit code for error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Repository(_) | Self::AllDeliveriesFailed(_) => EXIT_FAILURE,
            Self::Event(_) | Self::Stdin(_) | Self::Path(_) | Self::Config(_) => EXIT_USAGE,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = HookError> = std::result::Result<T, E>;
