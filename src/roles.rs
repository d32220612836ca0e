// Per-user roles. Every user is a student; teacher and researcher are
// added on request. Exactly one held role is active at a time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Researcher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Researcher => "researcher",
        }
    }

    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "researcher" => Some(Role::Researcher),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Role, RoleError> {
        Role::from_str(s).ok_or_else(|| RoleError::Unknown(s.to_string()))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RoleError {
    #[error("Unknown role {0:?}")]
    Unknown(String),

    #[error("The student role cannot be removed")]
    CannotRemoveStudent,

    #[error("Role {} is not held", .0.as_str())]
    NotHeld(Role),
}

impl From<RoleError> for AppError {
    fn from(e: RoleError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSet {
    pub roles: BTreeSet<Role>,
    pub active: Role,
}

impl Default for RoleSet {
    fn default() -> Self {
        Self {
            roles: BTreeSet::from([Role::Student]),
            active: Role::Student,
        }
    }
}

impl RoleSet {
    /// Rebuild from stored rows; student is re-added and an active role
    /// that isn't held falls back to student.
    pub fn from_parts(roles: impl IntoIterator<Item = Role>, active: Option<Role>) -> Self {
        let mut set = RoleSet::default();
        set.roles.extend(roles);
        if let Some(active) = active.filter(|r| set.roles.contains(r)) {
            set.active = active;
        }
        set
    }

    pub fn holds(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns false if the role was already held
    pub fn add(&mut self, role: Role) -> bool {
        self.roles.insert(role)
    }

    pub fn remove(&mut self, role: Role) -> Result<(), RoleError> {
        if role == Role::Student {
            return Err(RoleError::CannotRemoveStudent);
        }
        if !self.roles.remove(&role) {
            return Err(RoleError::NotHeld(role));
        }
        if self.active == role {
            self.active = Role::Student;
        }
        Ok(())
    }

    pub fn switch(&mut self, role: Role) -> Result<(), RoleError> {
        if !self.holds(role) {
            return Err(RoleError::NotHeld(role));
        }
        self.active = role;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_student() {
        let set = RoleSet::default();
        assert!(set.holds(Role::Student));
        assert_eq!(set.active, Role::Student);
        assert_eq!(set.roles.len(), 1);
    }

    #[test]
    fn test_student_cannot_be_removed() {
        let mut set = RoleSet::default();
        assert_eq!(set.remove(Role::Student), Err(RoleError::CannotRemoveStudent));
    }

    #[test]
    fn test_switch_requires_held_role() {
        let mut set = RoleSet::default();
        assert_eq!(set.switch(Role::Teacher), Err(RoleError::NotHeld(Role::Teacher)));

        assert!(set.add(Role::Teacher));
        assert!(!set.add(Role::Teacher));
        set.switch(Role::Teacher).unwrap();
        assert_eq!(set.active, Role::Teacher);
    }

    #[test]
    fn test_removing_active_role_reverts_to_student() {
        let mut set = RoleSet::default();
        set.add(Role::Researcher);
        set.switch(Role::Researcher).unwrap();
        set.remove(Role::Researcher).unwrap();
        assert_eq!(set.active, Role::Student);
        assert_eq!(set.remove(Role::Researcher), Err(RoleError::NotHeld(Role::Researcher)));
    }

    #[test]
    fn test_from_parts_repairs_bad_rows() {
        let set = RoleSet::from_parts([Role::Teacher], Some(Role::Researcher));
        assert!(set.holds(Role::Student));
        assert_eq!(set.active, Role::Student);
        assert_eq!(Role::parse("Teacher"), Ok(Role::Teacher));
        assert!(Role::parse("admin").is_err());
    }
}
