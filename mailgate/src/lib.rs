//! HTTP-to-SMTP relay.
//!
//! A single authenticated endpoint, `POST /mail`, accepts a recipient,
//! subject and body, and forwards the message through an upstream SMTP
//! server over implicit TLS with a fixed set of credentials.

pub use mailgate_macros::HttpStatus;

pub mod config;
pub mod error;
pub mod handler;
pub mod relay;
mod serve;

pub use config::{Config, EnvConfig};
pub use handler::{router, AppState};
pub use relay::{Relay, RelayError, SmtpRelay};
pub use serve::serve;
