//! Connection seam between the relay algorithm and the SMTP wire.
//!
//! [`Transport`] opens a connection and yields a [`Session`]; the relay only
//! ever talks to a session it successfully obtained. [`TlsTransport`] is the
//! production implementation on top of lettre's async SMTP connection.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;

/// Boxed cause carried by relay errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Opens connections to an upstream mail server.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Session: Session;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Session, BoxError>;
}

/// One established mail-submission session.
///
/// The underlying connection is released when the session is dropped.
#[async_trait]
pub trait Session: Send {
    async fn authenticate(
        &mut self,
        identity: &str,
        username: &str,
        password: &str,
    ) -> Result<(), BoxError>;

    async fn mail_from(&mut self, sender: &str) -> Result<(), BoxError>;

    async fn rcpt_to(&mut self, recipient: &str) -> Result<(), BoxError>;

    /// Asks the server for the body-write channel (`DATA`).
    async fn data(&mut self) -> Result<(), BoxError>;

    /// Streams the payload and closes the write channel.
    async fn write_body(&mut self, payload: &[u8]) -> Result<(), BoxError>;

    async fn quit(&mut self) -> Result<(), BoxError>;

    /// Best-effort teardown after a failed step.
    async fn abort(&mut self);
}

/// Implicit-TLS transport; the certificate is verified against the host name.
#[derive(Debug, Clone)]
pub struct TlsTransport {
    timeout: Duration,
    hello_name: ClientId,
}

impl TlsTransport {
    pub fn new(timeout: Duration) -> Self {
        TlsTransport {
            timeout,
            hello_name: ClientId::default(),
        }
    }
}

#[async_trait]
impl Transport for TlsTransport {
    type Session = TlsSession;

    async fn connect(&self, host: &str, port: u16) -> Result<TlsSession, BoxError> {
        let tls = TlsParameters::new(host.to_string())?;
        let conn = AsyncSmtpConnection::connect_tokio1(
            (host, port),
            Some(self.timeout),
            &self.hello_name,
            Some(tls),
            None,
        )
        .await?;
        Ok(TlsSession { conn })
    }
}

pub struct TlsSession {
    conn: AsyncSmtpConnection,
}

#[async_trait]
impl Session for TlsSession {
    async fn authenticate(
        &mut self,
        identity: &str,
        username: &str,
        password: &str,
    ) -> Result<(), BoxError> {
        self.conn
            .command(AuthPlain::new(identity, username, password))
            .await?;
        Ok(())
    }

    async fn mail_from(&mut self, sender: &str) -> Result<(), BoxError> {
        let sender = if sender.is_empty() {
            None
        } else {
            Some(sender.parse::<Address>()?)
        };
        self.conn.command(Mail::new(sender, vec![])).await?;
        Ok(())
    }

    async fn rcpt_to(&mut self, recipient: &str) -> Result<(), BoxError> {
        let recipient = recipient.parse::<Address>()?;
        self.conn.command(Rcpt::new(recipient, vec![])).await?;
        Ok(())
    }

    async fn data(&mut self) -> Result<(), BoxError> {
        self.conn.command(Data).await?;
        Ok(())
    }

    async fn write_body(&mut self, payload: &[u8]) -> Result<(), BoxError> {
        // dot-stuffs the payload and sends the terminating "\r\n.\r\n"
        self.conn.message(data_section(payload)).await?;
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), BoxError> {
        self.conn.quit().await?;
        Ok(())
    }

    async fn abort(&mut self) {
        self.conn.abort().await;
    }
}

/// Payload without its final CRLF, which the end-of-data marker supplies.
fn data_section(payload: &[u8]) -> &[u8] {
    payload.strip_suffix(b"\r\n").unwrap_or(payload)
}

/// `AUTH PLAIN` with an initial response carrying the authorization identity.
///
/// lettre's own `PLAIN` mechanism always sends an empty authorization
/// identity, so the command is built here.
struct AuthPlain {
    initial_response: String,
}

impl AuthPlain {
    fn new(identity: &str, username: &str, password: &str) -> Self {
        let raw = format!("{}\0{}\0{}", identity, username, password);
        AuthPlain {
            initial_response: BASE64_STANDARD.encode(raw),
        }
    }
}

impl fmt::Display for AuthPlain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AUTH PLAIN {}\r\n", self.initial_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_plain_encodes_identity_username_password() {
        let cmd = AuthPlain::new("id@example.com", "user", "pass").to_string();
        let encoded = cmd
            .strip_prefix("AUTH PLAIN ")
            .and_then(|rest| rest.strip_suffix("\r\n"))
            .unwrap();
        let decoded = BASE64_STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"id@example.com\0user\0pass");
    }

    #[test]
    fn data_section_leaves_no_blank_line_before_terminator() {
        let payload = crate::relay::MessagePayload::new("a@x", "b@x", "hi", "hello").into_bytes();
        let mut wire = data_section(&payload).to_vec();
        wire.extend_from_slice(b"\r\n.\r\n");
        assert!(wire.ends_with(b"\r\n\r\nhello\r\n.\r\n"));
        assert!(!wire.ends_with(b"hello\r\n\r\n.\r\n"));

        assert_eq!(data_section(b"no newline"), b"no newline");
        assert_eq!(data_section(b"two\r\n\r\n"), b"two\r\n");
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TlsTransport::new(Duration::from_secs(5));
        assert!(transport.connect("127.0.0.1", port).await.is_err());
    }
}
