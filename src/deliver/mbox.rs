// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Mbox delivery.
//!
//! Messages are appended in mboxrd form: a `From ` separator line, then the
//! message with every line that looks like a separator quoted with one more
//! `>`, then a blank line. The file is held under an exclusive advisory
//! lock for the whole append, so concurrent hooks never interleave. A lock
//! that stays contended past a short bound fails the delivery instead of
//! stalling the hook.

use crate::{
    deliver::{smtp::envelope_address, DeliveryError, Result},
    message::Message,
};

use chrono::Local;
use fs4::fs_std::FileExt;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use tracing::{debug, instrument};

/// Number of times to try the mbox lock before giving up.
const LOCK_ATTEMPTS: u32 = 20;

/// Pause between attempts to take the mbox lock.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Append message to mbox file, creating the file if needed.
///
/// # Errors
///
/// - Return [`LockError`] if file cannot be locked.
/// - Return [`DeliveryError::Mbox`] if file cannot be opened or written.
#[instrument(skip(path, message), fields(path = %path.display()), level = "debug")]
pub fn append(path: &Path, message: Message<'_>) -> Result<()> {
    let mbox_err = |source| DeliveryError::Mbox {
        path: path.to_path_buf(),
        source,
    };

    let sender = envelope_address(&message.from)
        .map(|address| address.to_string())
        .unwrap_or_else(|_| "MAILER-DAEMON".into());
    let bytes = message.into_bytes().map_err(DeliveryError::Render)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(mbox_err)?;
    let _guard = MboxLock::acquire(&file, path)?;

    let mut out = BufWriter::new(&file);
    writeln!(out, "From {sender} {}", Local::now().format("%a %b %e %H:%M:%S %Y"))
        .map_err(mbox_err)?;
    out.write_all(&quote(&bytes)).map_err(mbox_err)?;
    out.flush().map_err(mbox_err)?;
    debug!("appended {} bytes", bytes.len());

    Ok(())
}

/// Quote separator-like lines, and end message with a blank line.
pub fn quote(message: &[u8]) -> Vec<u8> {
    let mut quoted = Vec::with_capacity(message.len() + 2);
    for line in message.split_inclusive(|byte| *byte == b'\n') {
        let depth = line.iter().take_while(|byte| **byte == b'>').count();
        if line[depth..].starts_with(b"From ") {
            quoted.push(b'>');
        }
        quoted.extend_from_slice(line);
    }

    if !quoted.ends_with(b"\n") {
        quoted.push(b'\n');
    }
    quoted.push(b'\n');
    quoted
}

/// Exclusive lock on an mbox file, released on drop.
#[derive(Debug)]
struct MboxLock<'f> {
    file: &'f File,
}

impl<'f> MboxLock<'f> {
    fn acquire(file: &'f File, path: &Path) -> Result<Self, LockError> {
        let lock_err = |source| LockError {
            path: path.to_path_buf(),
            source,
        };

        for attempt in 1..=LOCK_ATTEMPTS {
            if FileExt::try_lock_exclusive(file).map_err(lock_err)? {
                return Ok(Self { file });
            }

            debug!("mbox is locked, attempt {attempt} of {LOCK_ATTEMPTS}");
            if attempt < LOCK_ATTEMPTS {
                thread::sleep(LOCK_RETRY_DELAY);
            }
        }

        Err(lock_err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "mbox stayed locked by another process",
        )))
    }
}

impl Drop for MboxLock<'_> {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(self.file) {
            debug!("failed to unlock mbox: {err}");
        }
    }
}

/// Mbox file cannot be locked.
#[derive(Debug, thiserror::Error)]
#[error("failed to lock mbox {path:?}")]
pub struct LockError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}
