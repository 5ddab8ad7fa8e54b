//! Ownership enforcer
//!
//! The whole point of the tool: walk the supplied instances in order, resolve
//! and validate the target login, select the jobs whose owner diverges, and
//! rewrite ownership subject to the apply-mode gate. Failures follow three
//! tiers: per-job (record and keep going), per-instance (warn and skip), and
//! scope-fatal (stop the run).

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::instance::{Connect, ServerTarget};
use crate::model::ADMIN_PRINCIPAL_ID;
use crate::report::{InstanceReport, JobOutcome, JobStatus, RunReport};
use crate::selection::select_jobs;

/// Gate applied to every mutating call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    /// Persist every selected change.
    #[default]
    Apply,
    /// Record what would change; write nothing.
    Preview,
    /// Ask the confirmation callback before each job.
    ConfirmEach,
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyMode::Apply => "apply",
            ApplyMode::Preview => "preview",
            ApplyMode::ConfirmEach => "confirm-each",
        };
        f.write_str(name)
    }
}

/// Per-job approval hook, consulted only in [`ApplyMode::ConfirmEach`].
pub trait Confirmation: Send {
    fn confirm(&mut self, instance: &str, job: &str, new_owner: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: FnMut(&str, &str, &str) -> bool + Send,
{
    fn confirm(&mut self, instance: &str, job: &str, new_owner: &str) -> bool {
        self(instance, job, new_owner)
    }
}

/// Approves everything; the non-interactive modes never consult it anyway.
pub struct ApproveAll;

impl Confirmation for ApproveAll {
    fn confirm(&mut self, _instance: &str, _job: &str, _new_owner: &str) -> bool {
        true
    }
}

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct EnforceOptions {
    pub targets: Vec<ServerTarget>,
    /// Target owner. `None` resolves the principal-id-1 login dynamically.
    pub login: Option<String>,
    /// Include filter on job names; empty means all jobs.
    pub include: Vec<String>,
    /// Exclude filter on job names, applied after the include filter.
    pub exclude: Vec<String>,
    pub mode: ApplyMode,
}

/// Scope-fatal failures. Per-instance and per-job failures never surface
/// here; they land in the [`RunReport`] as skips and job errors.
#[derive(Debug, Error)]
pub enum EnforceError {
    #[error("no instances supplied")]
    NoInstances,
    #[error("login '{login}' does not exist on {instance}")]
    LoginNotFound { login: String, instance: String },
    #[error("{instance} has no login with principal id 1 and no target login was supplied")]
    AdminLoginNotFound { instance: String },
    #[error("login '{login}' is a group principal and cannot own jobs")]
    GroupPrincipal { login: String },
}

/// Render an error with its full source chain, `outer: cause: root`.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Run the enforcer over every target in `opts`, sequentially.
///
/// When no target login is supplied, the name is resolved from the first
/// reachable instance (its principal-id-1 login) and reused for the rest of
/// the run; later instances validate that cached name against their own
/// login list rather than re-resolving.
pub async fn enforce_run(
    opts: &EnforceOptions,
    connector: &dyn Connect,
    confirm: &mut dyn Confirmation,
) -> Result<RunReport, EnforceError> {
    if opts.targets.is_empty() {
        return Err(EnforceError::NoInstances);
    }
    let single_instance = opts.targets.len() == 1;

    let mut report = RunReport::begin(opts.mode);
    let mut target_login: Option<String> = opts.login.clone();

    for target in &opts.targets {
        let address = target.address();

        let mut server = match connector.connect(target).await {
            Ok(server) => server,
            Err(err) => {
                let reason = error_chain(&err);
                warn!(instance = %address, "skipping instance, connection failed: {reason}");
                report.instances.push(InstanceReport::skipped(address, reason));
                continue;
            }
        };

        let logins = match server.logins().await {
            Ok(logins) => logins,
            Err(err) => {
                let reason = error_chain(&err);
                warn!(instance = %address, "skipping instance, login enumeration failed: {reason}");
                report.instances.push(InstanceReport::skipped(address, reason));
                continue;
            }
        };

        let login_name = match &target_login {
            Some(name) => name.clone(),
            None => match logins.iter().find(|l| l.principal_id == ADMIN_PRINCIPAL_ID) {
                Some(admin) => {
                    info!(instance = %address, login = %admin.name, "resolved default target login");
                    target_login = Some(admin.name.clone());
                    admin.name.clone()
                }
                None => {
                    if single_instance {
                        return Err(EnforceError::AdminLoginNotFound { instance: address });
                    }
                    let reason =
                        "no login with principal id 1; cannot resolve a default target".to_string();
                    warn!(instance = %address, "skipping instance: {reason}");
                    report.instances.push(InstanceReport::skipped(address, reason));
                    continue;
                }
            },
        };

        let Some(login) = logins.iter().find(|l| l.name == login_name) else {
            if single_instance {
                return Err(EnforceError::LoginNotFound {
                    login: login_name,
                    instance: address,
                });
            }
            let reason = format!("login '{login_name}' does not exist");
            warn!(instance = %address, "skipping instance: {reason}");
            report.instances.push(InstanceReport::skipped(address, reason));
            continue;
        };

        // The one scope-wide fatal condition: a group can never own jobs, so
        // there is nothing useful left to do on any instance.
        if login.kind.is_group() {
            return Err(EnforceError::GroupPrincipal { login: login_name });
        }

        let jobs = match server.jobs().await {
            Ok(jobs) => jobs,
            Err(err) => {
                let reason = error_chain(&err);
                warn!(instance = %address, "skipping instance, job enumeration failed: {reason}");
                report.instances.push(InstanceReport::skipped(address, reason));
                continue;
            }
        };

        let selected = select_jobs(&jobs, &login_name, &opts.include, &opts.exclude);
        info!(
            instance = %address,
            jobs = jobs.len(),
            divergent = selected.len(),
            target = %login_name,
            "computed job selection"
        );

        let mut outcomes = Vec::with_capacity(selected.len());
        for job in selected {
            let mut outcome = JobOutcome {
                job: job.name.clone(),
                previous_owner: job.owner_login_name.clone(),
                status: JobStatus::Planned,
                error: None,
            };

            match opts.mode {
                ApplyMode::Preview => {
                    info!(instance = %address, job = %job.name, owner = %login_name, "would change owner");
                }
                ApplyMode::ConfirmEach
                    if !confirm.confirm(&address, &job.name, &login_name) =>
                {
                    info!(instance = %address, job = %job.name, "change declined");
                    outcome.status = JobStatus::Declined;
                }
                ApplyMode::Apply | ApplyMode::ConfirmEach => {
                    match server.set_job_owner(&job.name, &login_name).await {
                        Ok(()) => {
                            info!(
                                instance = %address,
                                job = %job.name,
                                previous = %job.owner_login_name,
                                owner = %login_name,
                                "owner changed"
                            );
                            outcome.status = JobStatus::Applied;
                        }
                        Err(err) => {
                            let cause = error_chain(&err);
                            warn!(instance = %address, job = %job.name, "owner change failed: {cause}");
                            outcome.status = JobStatus::Failed;
                            outcome.error = Some(cause);
                        }
                    }
                }
            }
            outcomes.push(outcome);
        }

        report.instances.push(InstanceReport::completed(address, outcomes));
    }

    report.target_login = target_login;
    report.finish();
    Ok(report)
}
