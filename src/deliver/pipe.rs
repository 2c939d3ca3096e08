// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pipe delivery to a local mail command, e.g., `sendmail`.

use crate::{
    deliver::{DeliveryError, Result},
    message::Message,
};

use std::{
    io::{self, Write},
    process::{Command, Stdio},
    thread,
};
use tracing::{debug, instrument};

/// Feed message to mail command on its standard input.
///
/// Recipients are appended to the command words as extra arguments.
///
/// # Errors
///
/// - Return [`DeliveryError::Render`] if message cannot be rendered.
/// - Return [`DeliveryError::Spawn`] if command cannot be started.
/// - Return [`DeliveryError::Feed`] if writing the message fails.
/// - Return [`DeliveryError::Command`] if command exits with failure.
#[instrument(skip(command, message), level = "debug")]
pub fn send(command: &[String], message: Message<'_>) -> Result<()> {
    let (program, args) = command.split_first().ok_or(DeliveryError::EmptyCommand)?;
    let line = command.join(" ");
    let recipients = message.to.clone();
    debug!("pipe message to {line} for {}", recipients.join(", "));
    let bytes = message.into_bytes().map_err(DeliveryError::Render)?;

    let mut child = Command::new(program)
        .args(args)
        .args(&recipients)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DeliveryError::Spawn {
            command: line.clone(),
            source,
        })?;

    // INVARIANT: Stdin is written on its own thread while stderr drains
    // here, and is dropped once written so the command sees end of input.
    let feeder = child
        .stdin
        .take()
        .map(|mut stdin| thread::spawn(move || stdin.write_all(&bytes)));

    let output = child
        .wait_with_output()
        .map_err(|source| DeliveryError::Feed {
            command: line.clone(),
            source,
        })?;

    let fed = match feeder {
        Some(feeder) => feeder
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
        None => Ok(()),
    };

    if !output.status.success() {
        return Err(DeliveryError::Command {
            command: line,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    fed.map_err(|source| DeliveryError::Feed {
        command: line,
        source,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::deliver::{tests::sample, Transport};
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn shell(script: &str) -> Vec<String> {
        ["sh", "-c", script, "sh"].map(str::to_string).to_vec()
    }

    #[sealed_test]
    fn command_receives_message_and_recipients() -> anyhow::Result<()> {
        let command = shell("echo \"$@\" > message; cat >> message");

        send(&command, sample(Transport::Pipe(command.clone())))?;
        let result = std::fs::read_to_string("message")?;
        assert_eq!(result, "dev@example.org\nSubject: r1\n\nbody\n");

        Ok(())
    }

    #[test]
    fn failing_command_is_reported() {
        let command = shell("cat > /dev/null; echo nope >&2; exit 3");
        let result = send(&command, sample(Transport::Pipe(command.clone())));
        assert!(
            matches!(&result, Err(DeliveryError::Command { stderr, .. }) if stderr == "nope"),
            "{result:?}"
        );
    }

    #[sealed_test]
    fn chatty_command_does_not_stall() -> anyhow::Result<()> {
        let command = shell("head -c 200000 /dev/zero >&2; cat > message");
        let mut message = sample(Transport::Pipe(command.clone()));
        message.prologue = "x".repeat(300_000);

        send(&command, message)?;
        let result = std::fs::read_to_string("message")?;
        assert_eq!(result.len(), "Subject: r1\n\n".len() + 300_000);

        Ok(())
    }

    #[test]
    fn empty_command_is_reported() {
        let result = send(&[], sample(Transport::Stdout));
        assert!(matches!(result, Err(DeliveryError::EmptyCommand)));
    }
}
