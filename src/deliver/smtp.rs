// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! SMTP delivery.

use crate::{
    config::params::SmtpSecurity,
    deliver::{DeliveryError, Result},
};

use lettre::{
    address::Envelope,
    message::Mailbox,
    transport::smtp::{authentication::Credentials, SmtpTransport},
    Address, Transport as _,
};
use std::time::Duration;
use tracing::{debug, instrument};

/// Connection settings of an SMTP relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub hostname: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    pub timeout: Duration,
}

impl SmtpSettings {
    /// Build SMTP client for these settings.
    ///
    /// Nothing is sent over the network until a message is.
    ///
    /// # Errors
    ///
    /// - Return [`DeliveryError::Smtp`] if TLS cannot be set up for host.
    pub fn transport(&self) -> Result<SmtpTransport> {
        let smtp_err = |source| DeliveryError::Smtp {
            host: self.hostname.clone(),
            source,
        };

        let builder = match self.security {
            SmtpSecurity::Ssl => SmtpTransport::relay(&self.hostname).map_err(smtp_err)?,
            SmtpSecurity::StartTls => {
                SmtpTransport::starttls_relay(&self.hostname).map_err(smtp_err)?
            }
            SmtpSecurity::Plain => SmtpTransport::builder_dangerous(&self.hostname),
        };

        let mut builder = builder.timeout(Some(self.timeout));
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

/// Send rendered message through SMTP relay.
///
/// # Errors
///
/// - Return [`DeliveryError::Address`] if sender or a recipient is invalid.
/// - Return [`DeliveryError::Smtp`] if relay rejects the message.
#[instrument(skip(settings, bytes), fields(host = %settings.hostname), level = "debug")]
pub fn send(settings: &SmtpSettings, from: &str, to: &[String], bytes: &[u8]) -> Result<()> {
    let sender = envelope_address(from)?;
    let recipients = to
        .iter()
        .map(|address| envelope_address(address))
        .collect::<Result<Vec<_>>>()?;
    let envelope = Envelope::new(Some(sender), recipients).map_err(DeliveryError::Envelope)?;

    debug!("send {} bytes to {} recipients", bytes.len(), to.len());
    settings
        .transport()?
        .send_raw(&envelope, &crlf(bytes))
        .map_err(|source| DeliveryError::Smtp {
            host: settings.hostname.clone(),
            source,
        })?;

    Ok(())
}

/// Extract bare address, accepting both `addr` and `Name <addr>` forms.
///
/// # Errors
///
/// - Return [`DeliveryError::Address`] if address is malformed.
pub fn envelope_address(address: &str) -> Result<Address> {
    address
        .trim()
        .parse::<Mailbox>()
        .map(|mailbox| mailbox.email)
        .map_err(|source| DeliveryError::Address {
            address: address.to_string(),
            source,
        })
}

/// Normalize line endings to CRLF for the wire.
pub fn crlf(bytes: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(bytes.len() + bytes.len() / 32);
    let mut previous = 0u8;
    for &byte in bytes {
        if byte == b'\n' && previous != b'\r' {
            wire.push(b'\r');
        }
        wire.push(byte);
        previous = byte;
    }

    wire
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("svn@example.org", "svn@example.org"; "bare")]
    #[test_case("Alice Liddell <alice@example.org>", "alice@example.org"; "display name")]
    #[test]
    fn envelope_address_strips_display_name(input: &str, expect: &str) {
        let result = envelope_address(input).unwrap();
        pretty_assertions::assert_eq!(result.to_string(), expect);
    }

    #[test]
    fn reject_malformed_address() {
        assert!(matches!(
            envelope_address("not an address"),
            Err(DeliveryError::Address { .. })
        ));
    }

    #[test]
    fn normalize_line_endings() {
        assert_eq!(crlf(b"a\nb\r\nc\n"), b"a\r\nb\r\nc\r\n".to_vec());
    }
}
