//! # jobwarden
//!
//! Enforces a single ops invariant across SQL Server instances: every Agent
//! job is owned by a designated login (by default the server principal with
//! id 1). The library exposes the enforcer and the instance-client boundary;
//! the `jobwarden` binary wraps them in a CLI.

pub mod cli;
pub mod config;
pub mod enforcer;
pub mod instance;
pub mod model;
pub mod report;
pub mod selection;
pub mod telemetry;

pub use enforcer::{ApplyMode, EnforceError, EnforceOptions, enforce_run};
pub use model::{Job, Login, LoginKind};
pub use report::{InstanceOutcome, InstanceReport, JobOutcome, JobStatus, RunReport};
