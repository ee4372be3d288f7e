use std::fmt;
use std::time::Duration;

use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer};

pub use config::ConfigError;

/// Environment prefix used by the `mailgate` binary, e.g. `HG_SMTP_HOST`.
pub const ENV_PREFIX: &str = "HG";

pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }
}

/// Process configuration, read once at startup and shared read-only afterwards.
///
/// With the [`ENV_PREFIX`] prefix the fields map to `HG_AUTH_TOKEN`,
/// `HG_SMTP_HOST`, `HG_SMTP_PORT`, `HG_SMTP_USERNAME`, `HG_SMTP_PASSWORD`,
/// `HG_SMTP_IDENTITY`, `HG_SMTP_FROM`, and the optional `HG_LISTEN_ADDR`,
/// `HG_SMTP_TIMEOUT_SECS`, `HG_MAX_BODY_BYTES`.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Shared secret expected in `Authorization: Bearer <token>`.
    pub auth_token: String,

    /// Upstream SMTP host, also the name the TLS certificate is checked against.
    pub smtp_host: String,

    #[serde(deserialize_with = "deserialize_port")]
    pub smtp_port: u16,

    pub smtp_username: String,

    pub smtp_password: String,

    /// SASL authorization identity. Also declared as the envelope sender.
    pub smtp_identity: String,

    /// Address written into the `From` header.
    pub smtp_from: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_timeout_secs")]
    pub smtp_timeout_secs: u64,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Parses a port strictly, rejecting values outside `u16`.
///
/// Environment values arrive as strings; numeric sources are accepted too.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    struct PortVisitor;

    impl<'de> Visitor<'de> for PortVisitor {
        type Value = u16;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a TCP port number between 0 and 65535")
        }

        fn visit_str<E>(self, value: &str) -> Result<u16, E>
        where
            E: de::Error,
        {
            value
                .trim()
                .parse::<u16>()
                .map_err(|e| E::custom(format!("invalid port {:?}: {}", value, e)))
        }

        fn visit_u64<E>(self, value: u64) -> Result<u16, E>
        where
            E: de::Error,
        {
            u16::try_from(value).map_err(|_| E::custom(format!("port {} out of range", value)))
        }

        fn visit_i64<E>(self, value: i64) -> Result<u16, E>
        where
            E: de::Error,
        {
            u16::try_from(value).map_err(|_| E::custom(format!("port {} out of range", value)))
        }
    }

    deserializer.deserialize_any(PortVisitor)
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Config {
    /// Loads the configuration from `HG_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// `host:port` of the upstream server.
    pub fn smtp_addr(&self) -> String {
        format!("{}:{}", self.smtp_host, self.smtp_port)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }

    /// Address handed to the listener. A bare `:8080` binds every interface.
    pub fn bind_addr(&self) -> String {
        match self.listen_addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{}", port),
            None => self.listen_addr.clone(),
        }
    }

    /// Envelope sender for `MAIL FROM`, the username when no identity is set.
    pub fn envelope_sender(&self) -> &str {
        if self.smtp_identity.is_empty() {
            &self.smtp_username
        } else {
            &self.smtp_identity
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auth_token", &"<redacted>")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"<redacted>")
            .field("smtp_identity", &self.smtp_identity)
            .field("smtp_from", &self.smtp_from)
            .field("listen_addr", &self.listen_addr)
            .field("smtp_timeout_secs", &self.smtp_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        auth_token: "secret".into(),
        smtp_host: "smtp.example.com".into(),
        smtp_port: 465,
        smtp_username: "relay".into(),
        smtp_password: "hunter2".into(),
        smtp_identity: "relay@example.com".into(),
        smtp_from: "noreply@example.com".into(),
        listen_addr: default_listen_addr(),
        smtp_timeout_secs: default_timeout_secs(),
        max_body_bytes: default_max_body_bytes(),
    }
}
