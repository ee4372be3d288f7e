//! Relays a single message to one recipient through the upstream SMTP server.
//!
//! Each call opens its own connection, runs the full submission handshake,
//! and closes the connection again. Nothing is pooled, queued, or retried.

mod message;
mod transport;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

pub use message::{is_single_line, MessagePayload};
pub use transport::{BoxError, Session, TlsSession, TlsTransport, Transport};

/// Seam between the HTTP handler and the mail transport.
#[async_trait]
pub trait Relay: Send + Sync + 'static {
    async fn relay(&self, recipient: &str, subject: &str, body: &str) -> Result<(), RelayError>;
}

/// Handshake step that can fail after the connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Authenticate,
    DeclareSender,
    DeclareRecipient,
    OpenWriter,
    WriteBody,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandshakeStep::Authenticate => "authenticate",
            HandshakeStep::DeclareSender => "declare-sender",
            HandshakeStep::DeclareRecipient => "declare-recipient",
            HandshakeStep::OpenWriter => "open-writer",
            HandshakeStep::WriteBody => "write-body",
        })
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to establish secure connection to {addr}: {source}")]
    Transport { addr: String, source: BoxError },

    #[error("{step} failed ({context}): {source}")]
    Handshake {
        step: HandshakeStep,
        context: String,
        source: BoxError,
    },
}

impl RelayError {
    pub fn step(&self) -> Option<HandshakeStep> {
        match self {
            RelayError::Transport { .. } => None,
            RelayError::Handshake { step, .. } => Some(*step),
        }
    }
}

/// SMTP relay client bound to one upstream server and one set of credentials.
///
/// Connecting and every handshake step are bounded by the configured
/// SMTP timeout; an elapsed step fails like any other error of that step.
pub struct SmtpRelay<T = TlsTransport> {
    config: Arc<Config>,
    transport: T,
    timeout: Duration,
}

impl SmtpRelay<TlsTransport> {
    pub fn new(config: Arc<Config>) -> Self {
        let transport = TlsTransport::new(config.smtp_timeout());
        SmtpRelay::with_transport(config, transport)
    }
}

impl<T: Transport> SmtpRelay<T> {
    pub fn with_transport(config: Arc<Config>, transport: T) -> Self {
        let timeout = config.smtp_timeout();
        SmtpRelay {
            config,
            transport,
            timeout,
        }
    }

    async fn bounded<F, R>(&self, step: F) -> Result<R, BoxError>
    where
        F: Future<Output = Result<R, BoxError>>,
    {
        match tokio::time::timeout(self.timeout, step).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {}s", self.timeout.as_secs()).into()),
        }
    }

    async fn handshake(
        &self,
        session: &mut T::Session,
        recipient: &str,
        payload: &[u8],
    ) -> Result<(), RelayError> {
        let config = &self.config;

        self.bounded(session.authenticate(
            &config.smtp_identity,
            &config.smtp_username,
            &config.smtp_password,
        ))
        .await
        .map_err(|source| RelayError::Handshake {
            step: HandshakeStep::Authenticate,
            context: format!("{} as {}", config.smtp_host, config.smtp_username),
            source,
        })?;

        let sender = config.envelope_sender();
        self.bounded(session.mail_from(sender))
            .await
            .map_err(|source| RelayError::Handshake {
                step: HandshakeStep::DeclareSender,
                context: format!("mail from {}", sender),
                source,
            })?;

        self.bounded(session.rcpt_to(recipient))
            .await
            .map_err(|source| RelayError::Handshake {
                step: HandshakeStep::DeclareRecipient,
                context: format!("mail to {}", recipient),
                source,
            })?;

        self.bounded(session.data())
            .await
            .map_err(|source| RelayError::Handshake {
                step: HandshakeStep::OpenWriter,
                context: "data writer".to_string(),
                source,
            })?;

        self.bounded(session.write_body(payload))
            .await
            .map_err(|source| RelayError::Handshake {
                step: HandshakeStep::WriteBody,
                context: format!("{} bytes", payload.len()),
                source,
            })?;

        Ok(())
    }
}

#[async_trait]
impl<T: Transport> Relay for SmtpRelay<T> {
    async fn relay(&self, recipient: &str, subject: &str, body: &str) -> Result<(), RelayError> {
        let config = &self.config;
        let payload = MessagePayload::new(&config.smtp_from, recipient, subject, body).into_bytes();

        let mut session = self
            .bounded(self.transport.connect(&config.smtp_host, config.smtp_port))
            .await
            .map_err(|source| RelayError::Transport {
                addr: config.smtp_addr(),
                source,
            })?;

        match self.handshake(&mut session, recipient, &payload).await {
            Ok(()) => {
                if let Err(err) = self.bounded(session.quit()).await {
                    tracing::debug!("QUIT to {} failed after delivery: {}", config.smtp_addr(), err);
                }
                Ok(())
            }
            Err(err) => {
                if tokio::time::timeout(self.timeout, session.abort()).await.is_err() {
                    tracing::debug!("Abort of {} timed out, dropping connection", config.smtp_addr());
                }
                Err(err)
            }
        }
    }
}
