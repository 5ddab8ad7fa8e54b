//! In-memory instance client
//!
//! [`StaticAgentServer`] is a deterministic [`AgentServer`] used by the test
//! suites and by demos that have no live SQL Server at hand. State lives
//! behind an `Arc<Mutex<..>>` so a cloned handle given to the enforcer shares
//! its jobs and mutation log with the copy a test keeps for assertions.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::instance::{AgentServer, Connect, InstanceError, ServerTarget};
use crate::model::{Job, Login, LoginKind};

#[derive(Default)]
struct State {
    jobs: Vec<Job>,
    applied: Vec<(String, String)>,
    fail_jobs: HashSet<String>,
}

/// Scriptable in-memory instance.
#[derive(Clone)]
pub struct StaticAgentServer {
    name: String,
    logins: Vec<Login>,
    state: Arc<Mutex<State>>,
}

impl StaticAgentServer {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            logins: Vec::new(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_login<S: Into<String>>(mut self, name: S, principal_id: i32, kind: LoginKind) -> Self {
        self.logins.push(Login::new(name, principal_id, kind));
        self
    }

    pub fn with_job<S: Into<String>>(self, name: S, owner: S) -> Self {
        self.state.lock().unwrap().jobs.push(Job::new(name, owner));
        self
    }

    /// Make every future `set_job_owner` call for `job` fail.
    pub fn fail_on_job<S: Into<String>>(self, job: S) -> Self {
        self.state.lock().unwrap().fail_jobs.insert(job.into());
        self
    }

    /// Current owner of a job, if the job exists.
    pub fn owner_of(&self, job: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.name == job)
            .map(|j| j.owner_login_name.clone())
    }

    /// Every successful mutation in call order, as `(job, new_owner)`.
    pub fn applied(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn apply_count(&self) -> usize {
        self.state.lock().unwrap().applied.len()
    }
}

#[async_trait]
impl AgentServer for StaticAgentServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn logins(&mut self) -> Result<Vec<Login>, InstanceError> {
        Ok(self.logins.clone())
    }

    async fn jobs(&mut self) -> Result<Vec<Job>, InstanceError> {
        Ok(self.state.lock().unwrap().jobs.clone())
    }

    async fn set_job_owner(&mut self, job: &str, login: &str) -> Result<(), InstanceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_jobs.contains(job) {
            return Err(InstanceError::SetOwner {
                job: job.to_string(),
                instance: self.name.clone(),
                source: Box::new(io::Error::other("scripted failure")),
            });
        }
        if let Some(entry) = state.jobs.iter_mut().find(|j| j.name == job) {
            entry.owner_login_name = login.to_string();
        }
        state.applied.push((job.to_string(), login.to_string()));
        Ok(())
    }
}

/// A set of [`StaticAgentServer`]s addressable by `host:port`, standing in
/// for a fleet of real instances.
#[derive(Default)]
pub struct StaticFleet {
    servers: HashMap<String, StaticAgentServer>,
    unreachable: HashSet<String>,
}

impl StaticFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server under its own name.
    pub fn add(&mut self, server: StaticAgentServer) {
        self.servers.insert(server.name.clone(), server);
    }

    /// Make connections to `address` fail.
    pub fn mark_unreachable<S: Into<String>>(&mut self, address: S) {
        self.unreachable.insert(address.into());
    }

    /// Shared handle to a registered server, for post-run assertions.
    pub fn server(&self, address: &str) -> Option<&StaticAgentServer> {
        self.servers.get(address)
    }
}

#[async_trait]
impl Connect for StaticFleet {
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn AgentServer>, InstanceError> {
        let address = target.address();
        if self.unreachable.contains(&address) {
            return Err(InstanceError::Connect {
                instance: address,
                source: Box::new(io::Error::other("marked unreachable")),
            });
        }
        match self.servers.get(&address) {
            Some(server) => Ok(Box::new(server.clone())),
            None => Err(InstanceError::Connect {
                instance: address,
                source: Box::new(io::Error::other("no such server in fleet")),
            }),
        }
    }
}
