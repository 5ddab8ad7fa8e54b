//! TDS instance client
//!
//! Production [`AgentServer`] implementation over the `tiberius` driver.
//! Logins are read from `sys.server_principals`, jobs from
//! `msdb.dbo.sysjobs` (owner resolved through the principal SID), and
//! ownership changes go through `msdb.dbo.sp_update_job` so the server keeps
//! its own bookkeeping consistent.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::instance::{AgentServer, Connect, InstanceError, ServerTarget};
use crate::model::{Job, Login, LoginKind};

const LOGINS_SQL: &str =
    "SELECT name, principal_id, type FROM sys.server_principals WHERE type IN ('S', 'U', 'G')";

const JOBS_SQL: &str = "SELECT j.name AS name, ISNULL(sp.name, '') AS owner_login_name \
     FROM msdb.dbo.sysjobs AS j \
     LEFT JOIN sys.server_principals AS sp ON j.owner_sid = sp.sid";

const SET_OWNER_SQL: &str = "EXEC msdb.dbo.sp_update_job @job_name = @P1, @owner_login_name = @P2";

/// A live TDS session against one instance.
pub struct TdsAgentServer {
    name: String,
    client: Client<Compat<TcpStream>>,
}

impl TdsAgentServer {
    /// Open an authenticated session against `target`.
    ///
    /// The target must carry a credential; ambient-identity resolution (flags,
    /// then `JOBWARDEN_SQL_*` environment) happens before the target is built,
    /// so an absent credential here is a hard error rather than a guess.
    pub async fn connect(target: &ServerTarget) -> Result<Self, InstanceError> {
        let address = target.address();
        let credential =
            target
                .credential
                .as_ref()
                .ok_or_else(|| InstanceError::MissingCredential {
                    instance: address.clone(),
                })?;

        let mut config = Config::new();
        config.host(&target.host);
        config.port(target.port);
        config.authentication(AuthMethod::sql_server(&credential.user, &credential.password));
        // Ops tooling commonly runs against instances with self-signed certs.
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|err| InstanceError::Connect {
                instance: address.clone(),
                source: Box::new(err),
            })?;
        tcp.set_nodelay(true).map_err(|err| InstanceError::Connect {
            instance: address.clone(),
            source: Box::new(err),
        })?;

        let client = Client::connect(config, tcp.compat_write()).await.map_err(|err| {
            InstanceError::Connect {
                instance: address.clone(),
                source: Box::new(err),
            }
        })?;

        debug!(instance = %address, "connected");
        Ok(Self {
            name: address,
            client,
        })
    }
}

#[async_trait]
impl AgentServer for TdsAgentServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn logins(&mut self) -> Result<Vec<Login>, InstanceError> {
        let rows = self
            .client
            .simple_query(LOGINS_SQL)
            .await
            .map_err(|err| InstanceError::Query {
                instance: self.name.clone(),
                source: Box::new(err),
            })?
            .into_first_result()
            .await
            .map_err(|err| InstanceError::Query {
                instance: self.name.clone(),
                source: Box::new(err),
            })?;

        let mut logins = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row
                .try_get::<&str, _>("name")
                .map_err(|err| InstanceError::Query {
                    instance: self.name.clone(),
                    source: Box::new(err),
                })?
                .unwrap_or_default()
                .to_string();
            let principal_id = row
                .try_get::<i32, _>("principal_id")
                .map_err(|err| InstanceError::Query {
                    instance: self.name.clone(),
                    source: Box::new(err),
                })?
                .unwrap_or_default();
            let kind = row
                .try_get::<&str, _>("type")
                .map_err(|err| InstanceError::Query {
                    instance: self.name.clone(),
                    source: Box::new(err),
                })?
                .map(LoginKind::from_type_code)
                .unwrap_or(LoginKind::Other);
            logins.push(Login {
                name,
                principal_id,
                kind,
            });
        }
        Ok(logins)
    }

    async fn jobs(&mut self) -> Result<Vec<Job>, InstanceError> {
        let rows = self
            .client
            .simple_query(JOBS_SQL)
            .await
            .map_err(|err| InstanceError::Query {
                instance: self.name.clone(),
                source: Box::new(err),
            })?
            .into_first_result()
            .await
            .map_err(|err| InstanceError::Query {
                instance: self.name.clone(),
                source: Box::new(err),
            })?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row
                .try_get::<&str, _>("name")
                .map_err(|err| InstanceError::Query {
                    instance: self.name.clone(),
                    source: Box::new(err),
                })?
                .unwrap_or_default()
                .to_string();
            let owner = row
                .try_get::<&str, _>("owner_login_name")
                .map_err(|err| InstanceError::Query {
                    instance: self.name.clone(),
                    source: Box::new(err),
                })?
                .unwrap_or_default()
                .to_string();
            jobs.push(Job {
                name,
                owner_login_name: owner,
            });
        }
        Ok(jobs)
    }

    async fn set_job_owner(&mut self, job: &str, login: &str) -> Result<(), InstanceError> {
        self.client
            .execute(SET_OWNER_SQL, &[&job, &login])
            .await
            .map_err(|err| InstanceError::SetOwner {
                job: job.to_string(),
                instance: self.name.clone(),
                source: Box::new(err),
            })?;
        debug!(instance = %self.name, job, owner = login, "job owner updated");
        Ok(())
    }
}

/// Opens [`TdsAgentServer`] sessions for the enforcer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdsConnector;

#[async_trait]
impl Connect for TdsConnector {
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn AgentServer>, InstanceError> {
        Ok(Box::new(TdsAgentServer::connect(target).await?))
    }
}
