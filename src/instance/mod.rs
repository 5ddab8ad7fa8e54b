//! Instance client layer
//!
//! The enforcer never talks TDS directly; it consumes the [`AgentServer`]
//! trait, one handle per connected instance. [`tds::TdsAgentServer`] is the
//! production implementation, [`fake::StaticAgentServer`] the deterministic
//! in-memory one used by tests and demos.

pub mod fake;
pub mod tds;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Job, Login};

pub use fake::{StaticAgentServer, StaticFleet};
pub use tds::TdsConnector;

/// Default SQL Server TCP port.
pub const DEFAULT_PORT: u16 = 1433;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by an instance client.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to connect to {instance}")]
    Connect {
        instance: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to read state from {instance}")]
    Query {
        instance: String,
        #[source]
        source: BoxError,
    },
    #[error("could not change owner of job '{job}' on {instance}")]
    SetOwner {
        job: String,
        instance: String,
        #[source]
        source: BoxError,
    },
    #[error("invalid instance address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },
    #[error(
        "no credential supplied for {instance}; pass --sql-user/--sql-password \
         or set JOBWARDEN_SQL_USER and JOBWARDEN_SQL_PASSWORD"
    )]
    MissingCredential { instance: String },
}

/// SQL authentication credential. Absent credential means ambient identity,
/// which resolves at this boundary: explicit flags first, then the
/// `JOBWARDEN_SQL_USER`/`JOBWARDEN_SQL_PASSWORD` environment, then a hard
/// [`InstanceError::MissingCredential`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub password: String,
}

impl Credential {
    pub fn new<S: Into<String>>(user: S, password: S) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

// Manual impl so the password never lands in logs or panic payloads.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One target instance: a parsed `host[:port]` address plus the credential
/// to authenticate with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub host: String,
    pub port: u16,
    pub credential: Option<Credential>,
}

impl ServerTarget {
    /// Parse a `host[:port]` address. The port defaults to 1433.
    pub fn parse(value: &str, credential: Option<Credential>) -> Result<Self, InstanceError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(InstanceError::InvalidAddress {
                value: value.to_string(),
                reason: "address is empty".to_string(),
            });
        }

        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| InstanceError::InvalidAddress {
                        value: value.to_string(),
                        reason: format!("'{port}' is not a valid port"),
                    })?;
                (host, port)
            }
            None => (value, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(InstanceError::InvalidAddress {
                value: value.to_string(),
                reason: "host is empty".to_string(),
            });
        }

        Ok(Self {
            host: host.to_string(),
            port,
            credential,
        })
    }

    /// Display address, `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A connected instance exposing the two collections the enforcer reads and
/// the single mutation it performs.
#[async_trait]
pub trait AgentServer: Send {
    /// Display address of the instance, used in diagnostics and reports.
    fn name(&self) -> &str;

    /// All server logins (name, principal id, kind).
    async fn logins(&mut self) -> Result<Vec<Login>, InstanceError>;

    /// All Agent jobs, in server enumeration order.
    async fn jobs(&mut self) -> Result<Vec<Job>, InstanceError>;

    /// Persist a new owner for one job.
    async fn set_job_owner(&mut self, job: &str, login: &str) -> Result<(), InstanceError>;
}

/// Opens connections for the enforcer. The production implementation is
/// [`TdsConnector`]; tests substitute a [`StaticFleet`].
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn AgentServer>, InstanceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_host_with_default_port() {
        let target = ServerTarget::parse("db01.internal", None).unwrap();
        assert_eq!(target.host, "db01.internal");
        assert_eq!(target.port, DEFAULT_PORT);
        assert_eq!(target.address(), "db01.internal:1433");
    }

    #[test]
    fn parses_explicit_port() {
        let target = ServerTarget::parse("db01:14330", None).unwrap();
        assert_eq!(target.port, 14330);
    }

    #[test]
    fn rejects_bad_port_and_empty_host() {
        assert!(ServerTarget::parse("db01:not-a-port", None).is_err());
        assert!(ServerTarget::parse(":1433", None).is_err());
        assert!(ServerTarget::parse("  ", None).is_err());
    }

    #[test]
    fn credential_debug_redacts_password() {
        let cred = Credential::new("sa", "s3cret!");
        let rendered = format!("{cred:?}");
        assert!(rendered.contains("sa"));
        assert!(!rendered.contains("s3cret!"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
