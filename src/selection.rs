//! Job selection
//!
//! Pure filtering over the job list of one instance. The base set is every
//! job whose owner differs from the target login; an include list intersects
//! it and an exclude list always subtracts afterward, whether or not an
//! include list was given. Enumeration order of the input is preserved: the
//! enforcer mutates jobs in the order the server returned them.

use crate::model::Job;

/// Select the jobs on one instance whose ownership must change.
pub fn select_jobs<'a>(
    jobs: &'a [Job],
    target_login: &str,
    include: &[String],
    exclude: &[String],
) -> Vec<&'a Job> {
    jobs.iter()
        .filter(|job| job.owner_login_name != target_login)
        .filter(|job| include.is_empty() || include.iter().any(|name| name == &job.name))
        .filter(|job| !exclude.iter().any(|name| name == &job.name))
        .collect()
}
