// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles.
///
/// ## Role Hierarchy
///
/// - `Admin` - Full access to every record
/// - `Teacher` - Works within assigned classes
/// - `Student` - Read-only access to own data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    fn rank(self) -> u8 {
        match self {
            Role::Student => 0,
            Role::Teacher => 1,
            Role::Admin => 2,
        }
    }

    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Parse role from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::Admin => "Admin",
        }
    }
}

impl Default for Role {
    /// Least privilege.
    fn default() -> Self {
        Role::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_all_privileges() {
        for role in Role::ALL {
            assert!(Role::Admin.has_privilege(role));
        }
    }

    #[test]
    fn student_only_has_student_privilege() {
        assert!(Role::Student.has_privilege(Role::Student));
        assert!(!Role::Student.has_privilege(Role::Teacher));
        assert!(!Role::Student.has_privilege(Role::Admin));
        assert!(!Role::Teacher.has_privilege(Role::Admin));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("TEACHER"), Some(Role::Teacher));
        assert_eq!(Role::parse("Student"), Some(Role::Student));
        assert_eq!(Role::parse("principal"), None);
    }

    #[test]
    fn serializes_with_display_names() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"Teacher\"");
        assert_eq!(Role::Admin.to_string(), "Admin");
        assert_eq!(Role::default(), Role::Student);
    }
}
