// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization and visibility rules.
//!
//! Every handler describes what it is about to do as an [`Action`] on a
//! [`Resource`] and asks [`decide`] whether the caller may do it. A read that
//! is allowed comes back with a [`Scope`] the caller must apply to whatever it
//! loads from storage.
//!
//! The engine is pure: it never touches storage. The caller's role profile
//! (teacher assignment or student enrollment) is passed in as a
//! [`ProfileSnapshot`] loaded fresh for the request via [`RoleProfiles`].

mod class;
mod rules;
mod scope;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

pub use class::ClassId;
pub use rules::decide;
pub use scope::{Scope, ScopeTarget};

/// The authenticated caller, as seen by the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub role: Role,
    pub identity_id: String,
    pub registration_id: Option<String>,
}

impl Principal {
    pub fn new(role: Role, identity_id: impl Into<String>, registration_id: Option<String>) -> Self {
        Self {
            role,
            identity_id: identity_id.into(),
            registration_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_mutation(self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }
}

/// Who an announcement is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Visibility {
    /// Everyone.
    All,
    /// Members of one class.
    Class,
    /// Students of one class.
    Student,
    /// Staff only.
    Teacher,
}

impl Visibility {
    pub fn requires_class(self) -> bool {
        matches!(self, Visibility::Class | Visibility::Student)
    }
}

/// A validated announcement audience.
///
/// Class and Student audiences always carry a class; All and Teacher
/// audiences never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audience {
    visibility: Visibility,
    class: Option<ClassId>,
}

impl Audience {
    /// Build an audience from raw request input.
    pub fn new(visibility: Visibility, class: Option<i64>) -> Result<Self, InvalidTarget> {
        if !visibility.requires_class() {
            return Ok(Self {
                visibility,
                class: None,
            });
        }
        match class {
            Some(value) => Ok(Self {
                visibility,
                class: Some(ClassId::new(value)?),
            }),
            None => Err(InvalidTarget::new(format!(
                "{visibility:?} announcements require a target class"
            ))),
        }
    }

    /// Audience of an already stored announcement.
    pub fn stored(visibility: Visibility, class: Option<ClassId>) -> Result<Self, InvalidTarget> {
        Self::new(visibility, class.map(|c| i64::from(c.get())))
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn class(&self) -> Option<ClassId> {
        self.class
    }
}

/// Descriptor of a student record being listed, read or changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentTarget {
    /// Class the student is enrolled in now (or will be, on create).
    pub enrolled_class: ClassId,
    /// New class on an update that moves the student.
    pub move_to: Option<ClassId>,
}

/// Descriptor of a mark query or mark record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkTarget {
    /// Class of the mark being written. Required for create and update.
    pub class: Option<ClassId>,
    /// Exam chosen by the caller. Required when a student reads marks.
    pub exam: Option<String>,
}

/// Descriptor of an announcement query or change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnouncementTarget {
    /// Audience of the stored announcement (update, delete).
    pub current: Option<Audience>,
    /// Audience the caller asks for (create, update).
    pub requested: Option<Audience>,
}

/// The thing an action applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Student accounts. The target is required for mutations.
    Student(Option<StudentTarget>),
    /// Teacher accounts.
    Teacher,
    /// Admin accounts.
    Admin,
    Mark(MarkTarget),
    Announcement(AnnouncementTarget),
    Exam,
    Timetable,
    /// Personal profile (address, bio, picture) of one user.
    Profile { owner_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Student,
    Teacher,
    Admin,
    Mark,
    Announcement,
    Exam,
    Timetable,
    Profile,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Student(_) => ResourceKind::Student,
            Resource::Teacher => ResourceKind::Teacher,
            Resource::Admin => ResourceKind::Admin,
            Resource::Mark(_) => ResourceKind::Mark,
            Resource::Announcement(_) => ResourceKind::Announcement,
            Resource::Exam => ResourceKind::Exam,
            Resource::Timetable => ResourceKind::Timetable,
            Resource::Profile { .. } => ResourceKind::Profile,
        }
    }

    /// Resource descriptor for a user account of the given role.
    pub fn account(role: Role, student: Option<StudentTarget>) -> Self {
        match role {
            Role::Student => Resource::Student(student),
            Role::Teacher => Resource::Teacher,
            Role::Admin => Resource::Admin,
        }
    }
}

/// A malformed resource descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidTarget(String);

impl InvalidTarget {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DenyReason {
    #[error("out-of-scope class")]
    OutOfScopeClass,
    #[error("no assigned classes")]
    NoAssignedClasses,
    #[error("admin only")]
    AdminOnly,
    #[error("read-only role")]
    ReadOnlyRole,
    #[error("not owner")]
    NotOwner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Scope),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn into_result(self) -> Result<Scope, DenyReason> {
        match self {
            Decision::Allow(scope) => Ok(scope),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Engine outcome folded into a single error type for handlers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("{0}")]
    Denied(DenyReason),
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTarget),
}

impl From<DenyReason> for AccessError {
    fn from(reason: DenyReason) -> Self {
        AccessError::Denied(reason)
    }
}

/// Decide and flatten the result.
pub fn authorize(
    principal: &Principal,
    profile: &ProfileSnapshot,
    action: Action,
    resource: &Resource,
) -> Result<Scope, AccessError> {
    Ok(decide(principal, profile, action, resource)?.into_result()?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherAssignment {
    pub registration_id: String,
    pub subject: String,
    pub assigned_classes: BTreeSet<ClassId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentEnrollment {
    pub registration_id: String,
    pub enrolled_class: ClassId,
}

/// The caller's role profile at decision time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSnapshot {
    /// No role record (admins, or a record not created yet).
    Missing,
    Teacher(TeacherAssignment),
    Student(StudentEnrollment),
}

impl ProfileSnapshot {
    /// Classes a teacher may act on. Empty for anything else.
    pub fn assigned_classes(&self) -> BTreeSet<ClassId> {
        match self {
            ProfileSnapshot::Teacher(assignment) => assignment.assigned_classes.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn enrolled_class(&self) -> Option<ClassId> {
        match self {
            ProfileSnapshot::Student(enrollment) => Some(enrollment.enrolled_class),
            _ => None,
        }
    }
}

/// Lookup of per-role records.
pub trait RoleProfiles {
    type Error;

    fn teacher_assignment(
        &self,
        registration_id: &str,
    ) -> Result<Option<TeacherAssignment>, Self::Error>;

    fn student_enrollment(
        &self,
        registration_id: &str,
    ) -> Result<Option<StudentEnrollment>, Self::Error>;
}

/// Load the snapshot for `principal`. Never cached; call once per request.
pub fn load_snapshot<P: RoleProfiles + ?Sized>(
    profiles: &P,
    principal: &Principal,
) -> Result<ProfileSnapshot, P::Error> {
    let Some(registration_id) = principal.registration_id.as_deref() else {
        return Ok(ProfileSnapshot::Missing);
    };
    let snapshot = match principal.role {
        Role::Admin => ProfileSnapshot::Missing,
        Role::Teacher => profiles
            .teacher_assignment(registration_id)?
            .map_or(ProfileSnapshot::Missing, ProfileSnapshot::Teacher),
        Role::Student => profiles
            .student_enrollment(registration_id)?
            .map_or(ProfileSnapshot::Missing, ProfileSnapshot::Student),
    };
    Ok(snapshot)
}
