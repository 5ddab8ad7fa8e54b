//! CLI surface
//!
//! Two subcommands over the same selection flags: `enforce` mutates, `check`
//! is the read-only divergence probe for CI and cron (exits nonzero when any
//! job diverges). Exit codes: 0 clean, 1 completed with per-instance or
//! per-job failures (or divergence for `check`), 2 scope-fatal.

use std::io::{self, Write as _};

use clap::{Args, Parser, Subcommand};
use tracing::error;

use crate::config::AppConfig;
use crate::enforcer::{
    ApplyMode, ApproveAll, Confirmation, EnforceOptions, enforce_run,
};
use crate::instance::{Credential, ServerTarget, TdsConnector};
use crate::report::{InstanceOutcome, InstanceReport, JobStatus, RunReport};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURES: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(
    name = "jobwarden",
    about = "Enforce a single owner across SQL Server Agent jobs",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress the human-readable summary. Warnings and errors still log.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rewrite ownership of every Agent job that diverges from the target login.
    Enforce(EnforceArgs),
    /// Report divergent jobs without changing anything; exits 1 when any diverge.
    Check(SelectionArgs),
}

#[derive(Args)]
pub struct EnforceArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Gate applied to each mutating call.
    #[arg(long, value_enum, default_value_t = ApplyMode::Apply)]
    pub mode: ApplyMode,
}

#[derive(Args)]
pub struct SelectionArgs {
    /// Target instance address, `host[:port]`. Repeatable.
    #[arg(short = 'i', long = "instance", required = true)]
    pub instances: Vec<String>,

    /// Target owner login. Defaults to the login with principal id 1,
    /// resolved on the first reachable instance.
    #[arg(long)]
    pub login: Option<String>,

    /// Only consider jobs with these names. Repeatable.
    #[arg(long = "job")]
    pub jobs: Vec<String>,

    /// Never touch jobs with these names. Repeatable.
    #[arg(long = "exclude-job")]
    pub exclude_jobs: Vec<String>,

    /// SQL authentication user.
    #[arg(long, env = "JOBWARDEN_SQL_USER")]
    pub sql_user: Option<String>,

    /// SQL authentication password.
    #[arg(long, env = "JOBWARDEN_SQL_PASSWORD", hide_env_values = true)]
    pub sql_password: Option<String>,

    /// Emit the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Dispatch a parsed invocation. Returns the process exit code.
pub async fn run(cli: Cli, config: &AppConfig) -> i32 {
    match cli.command {
        Command::Enforce(args) => {
            let opts = match build_options(&args.selection, args.mode, config) {
                Ok(opts) => opts,
                Err(code) => return code,
            };
            let mut confirm: Box<dyn Confirmation> = match args.mode {
                ApplyMode::ConfirmEach => Box::new(StdinConfirmation),
                _ => Box::new(ApproveAll),
            };
            match enforce_run(&opts, &TdsConnector, confirm.as_mut()).await {
                Ok(report) => {
                    emit_report(&report, args.selection.json, cli.quiet);
                    if report.has_failures() {
                        EXIT_FAILURES
                    } else {
                        EXIT_OK
                    }
                }
                Err(err) => {
                    error!("{err}");
                    EXIT_FATAL
                }
            }
        }
        Command::Check(selection) => {
            let opts = match build_options(&selection, ApplyMode::Preview, config) {
                Ok(opts) => opts,
                Err(code) => return code,
            };
            match enforce_run(&opts, &TdsConnector, &mut ApproveAll).await {
                Ok(report) => {
                    emit_report(&report, selection.json, cli.quiet);
                    if report.has_failures() || report.divergent_count() > 0 {
                        EXIT_FAILURES
                    } else {
                        EXIT_OK
                    }
                }
                Err(err) => {
                    error!("{err}");
                    EXIT_FATAL
                }
            }
        }
    }
}

/// Assemble enforcer options from flags and config. Credential resolution:
/// flags first (clap also reads the `JOBWARDEN_SQL_*` process environment),
/// then the layered config; the instance client errors if nothing resolves.
fn build_options(
    selection: &SelectionArgs,
    mode: ApplyMode,
    config: &AppConfig,
) -> Result<EnforceOptions, i32> {
    let user = selection.sql_user.clone().or_else(|| config.sql_user.clone());
    let password = selection
        .sql_password
        .clone()
        .or_else(|| config.sql_password.clone());

    let credential = match (user, password) {
        (Some(user), Some(password)) => Some(Credential::new(user, password)),
        (None, None) => None,
        (Some(_), None) => {
            error!("--sql-user given without a password; set --sql-password or JOBWARDEN_SQL_PASSWORD");
            return Err(EXIT_FATAL);
        }
        (None, Some(_)) => {
            error!("--sql-password given without a user; set --sql-user or JOBWARDEN_SQL_USER");
            return Err(EXIT_FATAL);
        }
    };

    let mut targets = Vec::with_capacity(selection.instances.len());
    for address in &selection.instances {
        match ServerTarget::parse(address, credential.clone()) {
            Ok(target) => targets.push(target),
            Err(err) => {
                error!("{err}");
                return Err(EXIT_FATAL);
            }
        }
    }

    Ok(EnforceOptions {
        targets,
        login: selection.login.clone().or_else(|| config.default_login.clone()),
        include: selection.jobs.clone(),
        exclude: selection.exclude_jobs.clone(),
        mode,
    })
}

fn emit_report(report: &RunReport, json: bool, quiet: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => error!("could not render report: {err}"),
        }
        return;
    }
    if !quiet {
        print!("{}", render_summary(report));
    }
}

fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let target = report.target_login.as_deref().unwrap_or("<unresolved>");
    out.push_str(&format!(
        "run {} ({}): target owner '{}'\n",
        report.run_id, report.mode, target
    ));
    for instance in &report.instances {
        out.push_str(&render_instance(instance));
    }
    out.push_str(&format!(
        "{} applied, {} planned, {} failed, {} instance(s) skipped\n",
        report.applied_count(),
        report.planned_count(),
        report.failed_count(),
        report.skipped_instances()
    ));
    out
}

fn render_instance(instance: &InstanceReport) -> String {
    match &instance.outcome {
        InstanceOutcome::Skipped { reason } => {
            format!("  {}: skipped ({reason})\n", instance.instance)
        }
        InstanceOutcome::Completed => {
            let mut out = String::new();
            if instance.jobs.is_empty() {
                out.push_str(&format!("  {}: all jobs conform\n", instance.instance));
                return out;
            }
            out.push_str(&format!("  {}:\n", instance.instance));
            for job in &instance.jobs {
                let verdict = match job.status {
                    JobStatus::Applied => "changed",
                    JobStatus::Planned => "would change",
                    JobStatus::Declined => "declined",
                    JobStatus::Failed => "FAILED",
                };
                out.push_str(&format!(
                    "    {} (was '{}'): {}{}\n",
                    job.job,
                    job.previous_owner,
                    verdict,
                    job.error
                        .as_deref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                ));
            }
            out
        }
    }
}

/// Interactive y/N prompt for `--mode confirm-each`.
struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&mut self, instance: &str, job: &str, new_owner: &str) -> bool {
        print!("Change owner of '{job}' on {instance} to '{new_owner}'? [y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes" | "Yes" | "YES")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn summary_names_skipped_instances() {
        let mut report = RunReport::begin(ApplyMode::Apply);
        report.target_login = Some("sa".to_string());
        report.instances.push(InstanceReport::skipped(
            "beta:1433".to_string(),
            "login 'sa' does not exist".to_string(),
        ));
        let summary = render_summary(&report);
        assert!(summary.contains("beta:1433: skipped (login 'sa' does not exist)"));
        assert!(summary.contains("1 instance(s) skipped"));
    }
}
