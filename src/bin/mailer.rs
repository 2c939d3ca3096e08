// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use svn_mailer::{
    event::Mode,
    hook::{run, Invocation},
};

use anyhow::Result;
use clap::Parser;
use std::{io, path::PathBuf, process::exit};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Send notification mail for repository events from hook scripts.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "mailer [options] <mode> <repos_path> <id> [<propname> <action>]",
    version
)]
struct Cli {
    /// Event kind: commit, propchange, lock, or unlock.
    #[arg(value_name = "mode")]
    pub mode: Mode,

    /// Path to repository.
    #[arg(value_name = "repos_path")]
    pub repos_path: PathBuf,

    /// Revision, transaction, or lock owner.
    #[arg(value_name = "id")]
    pub id: String,

    /// Revision property name, for propchange.
    #[arg(value_name = "propname")]
    pub propname: Option<String>,

    /// Property action A, M, or D, for propchange.
    #[arg(value_name = "action")]
    pub action: Option<String>,

    /// Configuration file, defaults to <repos_path>/conf/mailer.conf.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// User performing the change.
    #[arg(short, long, value_name = "user")]
    pub author: Option<String>,

    /// Print messages to standard output instead of sending them.
    #[arg(long)]
    pub stdout: bool,
}

impl From<Cli> for Invocation {
    fn from(cli: Cli) -> Self {
        Self {
            mode: cli.mode,
            repos_path: cli.repos_path,
            id: cli.id,
            propname: cli.propname,
            action: cli.action,
            config: cli.config,
            author: cli.author,
            force_stdout: cli.stdout,
        }
    }
}

fn main() {
    if let Err(error) = init_logging() {
        eprintln!("mailer: {error:?}");
    }

    let cli = Cli::parse();
    let code = run(cli.into(), io::stdin().lock(), io::stdout().lock());

    exit(code)
}

fn init_logging() -> Result<()> {
    let layer = fmt::layer().compact().with_writer(io::stderr);
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    Ok(())
}
