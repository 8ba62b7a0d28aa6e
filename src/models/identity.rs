use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Permission that places a connection in the tenant's admin group.
pub const TASK_MANAGEMENT_PERMISSION: &str = "manage_tasks";
pub const ADMIN_ROLE: &str = "admin";

/// Company a record or connection belongs to. Every store call, broadcast
/// group and key-store key is built from one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is on the other end of a connection or request, as resolved from the
/// bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub tenant_id: TenantId,
    pub permissions: Vec<String>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
            || self
                .permissions
                .iter()
                .any(|p| p == TASK_MANAGEMENT_PERMISSION)
    }

    /// Key used for per-sender state such as rate windows.
    pub fn scoped_key(&self) -> String {
        format!("{}:{}", self.tenant_id, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: &str, permissions: &[&str]) -> Identity {
        Identity {
            user_id: "u1".into(),
            name: "Ana".into(),
            role: role.into(),
            tenant_id: TenantId::new("acme"),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn admin_by_role_or_permission() {
        assert!(identity("admin", &[]).is_admin());
        assert!(identity("staff", &["manage_tasks"]).is_admin());
        assert!(!identity("staff", &["view_reports"]).is_admin());
    }

    #[test]
    fn scoped_key_includes_tenant() {
        assert_eq!(identity("staff", &[]).scoped_key(), "acme:u1");
    }
}
