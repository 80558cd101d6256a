use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique role identifier
pub type RoleId = Uuid;

/// A user or group that owns alerts and receives their notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_muted: bool,
    #[serde(default)]
    pub is_blocked: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Role {
    /// Create an active, non-admin role with an email address
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: Some(email.into()),
            is_admin: false,
            is_muted: false,
            is_blocked: false,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_blocked && self.deleted_at.is_none()
    }

    /// Whether alert notifications may be sent to this role
    pub fn is_alertable(&self) -> bool {
        self.email.is_some() && self.is_active() && !self.is_muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_role_is_alertable() {
        let role = Role::new("analyst", "analyst@example.com");
        assert!(role.is_alertable());
    }

    #[test]
    fn test_alertable_requires_email_and_active() {
        let mut role = Role::new("analyst", "analyst@example.com");
        role.email = None;
        assert!(!role.is_alertable());

        let mut role = Role::new("analyst", "analyst@example.com");
        role.is_muted = true;
        assert!(!role.is_alertable());

        let mut role = Role::new("analyst", "analyst@example.com");
        role.is_blocked = true;
        assert!(!role.is_alertable());

        let mut role = Role::new("analyst", "analyst@example.com");
        role.deleted_at = Some(Utc::now());
        assert!(!role.is_alertable());
    }
}
