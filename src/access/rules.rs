// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The decision function.

use std::collections::BTreeSet;

use crate::auth::Role;

use super::{
    Action, Audience, AnnouncementTarget, ClassId, Decision, DenyReason, InvalidTarget,
    MarkTarget, Principal, ProfileSnapshot, Resource, Scope, Visibility,
};

/// Decide whether `principal` may perform `action` on `resource`.
///
/// Malformed descriptors yield `Err(InvalidTarget)` for every role. Any
/// well-formed input produces a decision.
pub fn decide(
    principal: &Principal,
    profile: &ProfileSnapshot,
    action: Action,
    resource: &Resource,
) -> Result<Decision, InvalidTarget> {
    validate(action, resource)?;

    match principal.role {
        Role::Admin => Ok(Decision::Allow(Scope::Unrestricted)),
        Role::Teacher => Ok(teacher(principal, &profile.assigned_classes(), action, resource)),
        Role::Student => student(principal, profile.enrolled_class(), action, resource),
    }
}

fn validate(action: Action, resource: &Resource) -> Result<(), InvalidTarget> {
    match (action, resource) {
        (Action::Create | Action::Update | Action::Delete, Resource::Student(None)) => {
            Err(InvalidTarget::new("student record is required"))
        }
        (Action::Create | Action::Update, Resource::Mark(MarkTarget { class: None, .. })) => {
            Err(InvalidTarget::new("mark class is required"))
        }
        (Action::Create, Resource::Announcement(t)) if t.requested.is_none() => {
            Err(InvalidTarget::new("announcement audience is required"))
        }
        (Action::Update, Resource::Announcement(t))
            if t.requested.is_none() || t.current.is_none() =>
        {
            Err(InvalidTarget::new("current and requested audience are required"))
        }
        (Action::Delete, Resource::Announcement(t)) if t.current.is_none() => {
            Err(InvalidTarget::new("announcement audience is required"))
        }
        _ => Ok(()),
    }
}

fn teacher(
    principal: &Principal,
    classes: &BTreeSet<ClassId>,
    action: Action,
    resource: &Resource,
) -> Decision {
    if let Resource::Profile { owner_id } = resource {
        return own_profile(principal, owner_id, action);
    }

    if !action.is_mutation() {
        let scope = match resource {
            Resource::Student(_) | Resource::Mark(_) => Scope::for_classes(classes),
            Resource::Admin => Scope::Empty,
            _ => Scope::Unrestricted,
        };
        return Decision::Allow(scope);
    }

    if classes.is_empty() {
        return Decision::Deny(DenyReason::NoAssignedClasses);
    }

    match resource {
        Resource::Student(Some(target)) => {
            let mut required = vec![target.enrolled_class];
            if action == Action::Update {
                required.extend(target.move_to);
            }
            within(classes, required)
        }
        Resource::Mark(MarkTarget { class, .. }) => match action {
            Action::Delete => Decision::Deny(DenyReason::AdminOnly),
            _ => within(classes, class.iter().copied()),
        },
        Resource::Announcement(AnnouncementTarget { current, requested }) => {
            // Update must pass on both the stored and the requested audience.
            if current
                .iter()
                .chain(requested.iter())
                .all(|a| teacher_may_address(classes, a))
            {
                Decision::Allow(Scope::Unrestricted)
            } else {
                Decision::Deny(DenyReason::OutOfScopeClass)
            }
        }
        Resource::Exam if action == Action::Create => Decision::Allow(Scope::Unrestricted),
        Resource::Student(None) => Decision::Deny(DenyReason::OutOfScopeClass),
        Resource::Teacher
        | Resource::Admin
        | Resource::Exam
        | Resource::Timetable
        | Resource::Profile { .. } => Decision::Deny(DenyReason::AdminOnly),
    }
}

fn within(classes: &BTreeSet<ClassId>, required: impl IntoIterator<Item = ClassId>) -> Decision {
    if required.into_iter().all(|class| classes.contains(&class)) {
        Decision::Allow(Scope::Unrestricted)
    } else {
        Decision::Deny(DenyReason::OutOfScopeClass)
    }
}

fn teacher_may_address(classes: &BTreeSet<ClassId>, audience: &Audience) -> bool {
    match audience.visibility() {
        Visibility::All | Visibility::Teacher => true,
        Visibility::Class | Visibility::Student => audience
            .class()
            .is_some_and(|class| classes.contains(&class)),
    }
}

fn student(
    principal: &Principal,
    enrolled_class: Option<ClassId>,
    action: Action,
    resource: &Resource,
) -> Result<Decision, InvalidTarget> {
    if let Resource::Profile { owner_id } = resource {
        return Ok(own_profile(principal, owner_id, action));
    }
    if action.is_mutation() {
        return Ok(Decision::Deny(DenyReason::ReadOnlyRole));
    }

    let own = principal.registration_id.clone();
    let scope = match resource {
        Resource::Student(_) => own.map_or(Scope::Empty, Scope::Registration),
        Resource::Teacher | Resource::Admin => Scope::Empty,
        Resource::Mark(MarkTarget { exam, .. }) => {
            let exam = exam
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| InvalidTarget::new("exam is required"))?;
            match own {
                Some(registration_id) => Scope::StudentMarks {
                    registration_id,
                    exam: exam.to_string(),
                },
                None => Scope::Empty,
            }
        }
        Resource::Announcement(_) => Scope::Audience {
            class: enrolled_class,
        },
        Resource::Exam | Resource::Timetable | Resource::Profile { .. } => Scope::Unrestricted,
    };
    Ok(Decision::Allow(scope))
}

fn own_profile(principal: &Principal, owner_id: &str, action: Action) -> Decision {
    match action {
        Action::List | Action::Read => Decision::Allow(Scope::Unrestricted),
        Action::Update if principal.identity_id == owner_id => Decision::Allow(Scope::Unrestricted),
        Action::Update => Decision::Deny(DenyReason::NotOwner),
        Action::Create | Action::Delete => Decision::Deny(DenyReason::AdminOnly),
    }
}
