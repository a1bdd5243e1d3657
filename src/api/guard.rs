// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bridge between handlers and the access rules.
//!
//! A [`Caller`] is built fresh for every request: the account is re-read, its
//! role and registration id come from storage rather than the token, and the
//! role profile snapshot is loaded through [`StorageProfiles`].

use crate::{
    access::{self, AccessError, Action, Principal, ProfileSnapshot, Resource, Scope},
    auth::{current_account, AuthenticatedUser, Role},
    error::ApiError,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, StorageProfiles, StorageResult, StoredUser,
        StudentRepository, TeacherRepository,
    },
};

pub struct Caller {
    pub principal: Principal,
    pub profile: ProfileSnapshot,
    pub account: StoredUser,
}

impl Caller {
    pub fn load(state: &AppState, user: &AuthenticatedUser) -> Result<Self, ApiError> {
        let account = current_account(state, user)?;
        let registration_id = registration_of(state, &account.id, account.role)?;
        let principal = Principal::new(account.role, account.id.clone(), registration_id);

        let profiles = StorageProfiles::new(state.storage(), state.index());
        let profile = access::load_snapshot(&profiles, &principal)?;

        Ok(Self {
            principal,
            profile,
            account,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.account.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn is_admin(&self) -> bool {
        self.principal.role == Role::Admin
    }

    /// Ask the rules for a decision. Denials are audited.
    pub fn authorize(
        &self,
        state: &AppState,
        action: Action,
        resource: &Resource,
    ) -> Result<Scope, ApiError> {
        match access::authorize(&self.principal, &self.profile, action, resource) {
            Ok(scope) => Ok(scope),
            Err(err) => {
                if let AccessError::Denied(reason) = &err {
                    tracing::info!(
                        user_id = %self.account.id,
                        role = %self.principal.role,
                        ?action,
                        resource = ?resource.kind(),
                        %reason,
                        "Access denied"
                    );
                    AuditRepository::new(state.storage()).record(
                        AuditEvent::new(AuditEventType::PermissionDenied)
                            .with_user(&self.account.id)
                            .with_details(serde_json::json!({
                                "action": format!("{action:?}"),
                                "resource": format!("{:?}", resource.kind()),
                            }))
                            .failed(reason.to_string()),
                    );
                }
                Err(err.into())
            }
        }
    }
}

/// Registration id of the user's student or teacher record.
pub fn registration_of(state: &AppState, user_id: &str, role: Role) -> StorageResult<Option<String>> {
    Ok(match role {
        Role::Student => StudentRepository::new(state.storage(), state.index())
            .find(user_id)?
            .map(|s| s.registration_id),
        Role::Teacher => TeacherRepository::new(state.storage(), state.index())
            .find(user_id)?
            .map(|t| t.registration_id),
        Role::Admin => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ClassId, StudentTarget};
    use crate::api::testing::{seed_student, seed_teacher};
    use crate::state::testing::test_state;
    use crate::storage::{AuditFilter, TeacherRecord};
    use axum::http::StatusCode;
    use std::collections::BTreeSet;

    #[test]
    fn caller_reads_profile_from_storage() {
        let (_temp, state) = test_state();
        let user = seed_teacher(&state, "T-01", &[10, 11]);

        let caller = Caller::load(&state, &user).unwrap();
        assert_eq!(caller.principal.registration_id.as_deref(), Some("T-01"));
        assert_eq!(caller.profile.assigned_classes().len(), 2);
    }

    #[test]
    fn reassignment_applies_to_next_request() {
        let (_temp, state) = test_state();
        let user = seed_teacher(&state, "T-01", &[10]);
        let target = Resource::Student(Some(StudentTarget {
            enrolled_class: ClassId::new(10).unwrap(),
            move_to: None,
        }));

        let caller = Caller::load(&state, &user).unwrap();
        assert!(caller.authorize(&state, Action::Update, &target).is_ok());

        let teachers = TeacherRepository::new(state.storage(), state.index());
        let mut record: TeacherRecord = teachers.get(&user.user_id).unwrap();
        record.assigned_classes = BTreeSet::new();
        teachers.update(&record).unwrap();

        let caller = Caller::load(&state, &user).unwrap();
        let err = caller.authorize(&state, Action::Update, &target).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(err.message.contains("no assigned classes"));
    }

    #[test]
    fn denials_are_audited() {
        let (_temp, state) = test_state();
        let user = seed_student(&state, "S-01", 10);
        let caller = Caller::load(&state, &user).unwrap();

        let err = caller
            .authorize(&state, Action::Create, &Resource::Exam)
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let today = chrono::Utc::now().date_naive();
        let events = AuditRepository::new(state.storage())
            .query(
                today,
                today,
                &AuditFilter {
                    event_type: Some("permission_denied".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].error.as_deref(), Some("read-only role"));
    }
}
