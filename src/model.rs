//! Read models for server state
//!
//! Typed snapshots of the two server collections the enforcer works with:
//! logins and Agent jobs. Both are fetched fresh per run; neither is cached
//! or persisted locally.

use serde::{Deserialize, Serialize};

/// Principal id of the conventional system administrator login. The account
/// can be renamed, so resolution goes through the id rather than the name.
pub const ADMIN_PRINCIPAL_ID: i32 = 1;

/// Classification of a server principal, derived from the one-character
/// `type` column of `sys.server_principals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginKind {
    /// SQL-authenticated login (`S`).
    SqlLogin,
    /// Windows user login (`U`).
    WindowsLogin,
    /// Windows group principal (`G`). Groups cannot own Agent jobs.
    WindowsGroup,
    /// Any other principal type the server may report.
    Other,
}

impl LoginKind {
    /// Map the `sys.server_principals.type` code to a kind.
    pub fn from_type_code(code: &str) -> Self {
        match code.trim() {
            "S" => LoginKind::SqlLogin,
            "U" => LoginKind::WindowsLogin,
            "G" => LoginKind::WindowsGroup,
            _ => LoginKind::Other,
        }
    }

    /// Group principals cannot own jobs and are rejected as targets.
    pub fn is_group(&self) -> bool {
        matches!(self, LoginKind::WindowsGroup)
    }
}

/// A server login as read from `sys.server_principals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub name: String,
    pub principal_id: i32,
    pub kind: LoginKind,
}

impl Login {
    pub fn new<S: Into<String>>(name: S, principal_id: i32, kind: LoginKind) -> Self {
        Self {
            name: name.into(),
            principal_id,
            kind,
        }
    }
}

/// An Agent job as read from `msdb.dbo.sysjobs`. `name` is unique per
/// instance; `owner_login_name` is the attribute this tool rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub owner_login_name: String,
}

impl Job {
    pub fn new<S: Into<String>>(name: S, owner: S) -> Self {
        Self {
            name: name.into(),
            owner_login_name: owner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_map_to_kinds() {
        assert_eq!(LoginKind::from_type_code("S"), LoginKind::SqlLogin);
        assert_eq!(LoginKind::from_type_code("U"), LoginKind::WindowsLogin);
        assert_eq!(LoginKind::from_type_code("G"), LoginKind::WindowsGroup);
        assert_eq!(LoginKind::from_type_code("C"), LoginKind::Other);
        assert_eq!(LoginKind::from_type_code("R"), LoginKind::Other);
    }

    #[test]
    fn type_codes_are_trimmed() {
        // CHAR(1) columns come back space-padded from some drivers.
        assert_eq!(LoginKind::from_type_code("S "), LoginKind::SqlLogin);
    }

    #[test]
    fn only_groups_are_groups() {
        assert!(LoginKind::WindowsGroup.is_group());
        assert!(!LoginKind::SqlLogin.is_group());
        assert!(!LoginKind::WindowsLogin.is_group());
        assert!(!LoginKind::Other.is_group());
    }
}
