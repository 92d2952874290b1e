use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};

/// Strictly ordered roles; the stored role is the single source of truth
/// for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "viewer" => Some(Role::Viewer),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// The authenticated identity, passed explicitly into every rule and logger
/// call rather than read from ambient state.
#[derive(Debug, Clone)]
pub struct Actor {
    pub uid: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewFleet,
    ViewLogs,
    EditStatus,
    EditPartIssue,
    EditFreeText,
    AddSite,
    AddRobot,
    DeleteRobot,
    EditLog,
    DeleteLog,
    ManageUsers,
    ImportRobots,
    RunMaintenance,
}

/// Single authority check for every gated operation.
pub fn can(actor: &Actor, action: Action) -> bool {
    match action {
        Action::ViewFleet | Action::ViewLogs => true,
        Action::EditStatus
        | Action::EditPartIssue
        | Action::AddSite
        | Action::AddRobot
        | Action::ImportRobots => actor.role >= Role::Admin,
        Action::EditFreeText
        | Action::DeleteRobot
        | Action::EditLog
        | Action::DeleteLog
        | Action::ManageUsers
        | Action::RunMaintenance => actor.role >= Role::SuperAdmin,
    }
}

impl Actor {
    pub fn require(&self, action: Action) -> FleetResult<()> {
        if can(self, action) {
            Ok(())
        } else {
            Err(FleetError::Forbidden(format!(
                "Role '{}' may not perform this action",
                self.role.as_str()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            uid: "u1".into(),
            email: "op@example.com".into(),
            role,
        }
    }

    #[test]
    fn role_ordering() {
        assert!(Role::Viewer < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
        assert_eq!(Role::parse("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn viewer_is_read_only() {
        let v = actor(Role::Viewer);
        assert!(can(&v, Action::ViewFleet));
        assert!(can(&v, Action::ViewLogs));
        assert!(!can(&v, Action::EditStatus));
        assert!(!can(&v, Action::AddRobot));
        assert!(!can(&v, Action::DeleteRobot));
        assert!(v.require(Action::DeleteRobot).is_err());
    }

    #[test]
    fn admin_edits_but_does_not_delete() {
        let a = actor(Role::Admin);
        assert!(can(&a, Action::EditStatus));
        assert!(can(&a, Action::EditPartIssue));
        assert!(can(&a, Action::AddSite));
        assert!(can(&a, Action::ImportRobots));
        assert!(!can(&a, Action::EditFreeText));
        assert!(!can(&a, Action::DeleteRobot));
        assert!(!can(&a, Action::ManageUsers));
    }

    #[test]
    fn super_admin_can_do_everything() {
        let s = actor(Role::SuperAdmin);
        for action in [
            Action::ViewFleet,
            Action::EditStatus,
            Action::EditFreeText,
            Action::DeleteRobot,
            Action::EditLog,
            Action::DeleteLog,
            Action::ManageUsers,
            Action::RunMaintenance,
        ] {
            assert!(can(&s, action));
        }
    }
}
