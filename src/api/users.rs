// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.
//!
//! Accounts plus their role records (student enrollment or teacher
//! assignment). Every call goes through the access rules; a teacher sees and
//! manages only the students of their assigned classes.

use std::collections::{BTreeSet, HashMap};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::guard::Caller;
use super::profiles::remove_upload;
use super::response::{created, message, ok, ApiResult, Created, MessageResponse};
use crate::{
    access::{Action, ClassId, Resource, ScopeTarget, StudentTarget},
    audit_log,
    auth::{
        password::{hash_password, validate_password_strength},
        Auth, Role,
    },
    error::ApiError,
    state::AppState,
    storage::{
        index::name_key, AccountStatus, AuditEventType, PasswordResetRepository, ProfileRecord,
        ProfileRepository, StorageResult, StoredUser, StudentRecord, StudentRepository,
        TeacherRecord, TeacherRepository, UserRepository, UserResponse,
    },
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// An account together with its role data.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: UserResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
    /// Students only.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u32>)]
    pub enrolled_class: Option<ClassId>,
    /// Teachers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Teachers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<u32>>)]
    pub assigned_classes: Option<BTreeSet<ClassId>>,
}

impl UserDetails {
    fn build(
        user: &StoredUser,
        student: Option<&StudentRecord>,
        teacher: Option<&TeacherRecord>,
    ) -> Self {
        let registration_id = match user.role {
            Role::Student => student.map(|s| s.registration_id.clone()),
            Role::Teacher => teacher.map(|t| t.registration_id.clone()),
            Role::Admin => None,
        };
        Self {
            user: UserResponse::from(user),
            registration_id,
            enrolled_class: student.map(|s| s.enrolled_class),
            subject: teacher.map(|t| t.subject.clone()),
            assigned_classes: teacher.map(|t| t.assigned_classes.clone()),
        }
    }

    /// Load role data for one account.
    pub fn load(state: &AppState, user: &StoredUser) -> StorageResult<Self> {
        let student = match user.role {
            Role::Student => StudentRepository::new(state.storage(), state.index()).find(&user.id)?,
            _ => None,
        };
        let teacher = match user.role {
            Role::Teacher => TeacherRepository::new(state.storage(), state.index()).find(&user.id)?,
            _ => None,
        };
        Ok(Self::build(user, student.as_ref(), teacher.as_ref()))
    }
}

impl ScopeTarget for UserDetails {
    fn scope_class(&self) -> Option<ClassId> {
        self.enrolled_class
    }

    fn scope_registration(&self) -> Option<&str> {
        self.registration_id.as_deref()
    }
}

/// Role data for a batch of accounts, reading each collection once.
fn details_for(state: &AppState, users: Vec<StoredUser>) -> StorageResult<Vec<UserDetails>> {
    let students: HashMap<String, StudentRecord> = StudentRepository::new(state.storage(), state.index())
        .list_all()?
        .into_iter()
        .map(|s| (s.user_id.clone(), s))
        .collect();
    let teachers: HashMap<String, TeacherRecord> = TeacherRepository::new(state.storage(), state.index())
        .list_all()?
        .into_iter()
        .map(|t| (t.user_id.clone(), t))
        .collect();

    Ok(users
        .iter()
        .map(|u| UserDetails::build(u, students.get(&u.id), teachers.get(&u.id)))
        .collect())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// `Student`, `Teacher` or `Admin`. Absent means every type.
    #[serde(rename = "userType")]
    pub user_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Required for students and teachers.
    pub registration_id: Option<String>,
    /// Students: class to enroll in.
    pub class: Option<i64>,
    /// Teachers: subject taught.
    pub subject: Option<String>,
    /// Teachers: assigned classes.
    #[serde(default)]
    pub classes: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: Option<AccountStatus>,
    pub registration_id: Option<String>,
    /// Students: move to this class.
    pub class: Option<i64>,
    pub subject: Option<String>,
    /// Teachers: replace the assigned classes.
    pub classes: Option<Vec<i64>>,
}

/// Role record to create alongside a new account.
enum NewRoleRecord {
    Student {
        registration_id: String,
        class: ClassId,
    },
    Teacher {
        registration_id: String,
        subject: String,
        classes: BTreeSet<ClassId>,
    },
    Admin,
}

impl NewRoleRecord {
    fn from_request(req: &CreateUserRequest) -> Result<Self, ApiError> {
        let registration_id = || {
            req.registration_id
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ApiError::bad_request("registration_id is required"))
        };

        match req.role {
            Role::Student => {
                let class = req
                    .class
                    .ok_or_else(|| ApiError::bad_request("class is required for students"))?;
                Ok(NewRoleRecord::Student {
                    registration_id: registration_id()?,
                    class: ClassId::new(class)?,
                })
            }
            Role::Teacher => {
                let subject = non_empty(req.subject.as_deref().unwrap_or_default(), "subject")?;
                Ok(NewRoleRecord::Teacher {
                    registration_id: registration_id()?,
                    subject,
                    classes: class_set(&req.classes)?,
                })
            }
            Role::Admin => Ok(NewRoleRecord::Admin),
        }
    }

    fn registration_id(&self) -> Option<String> {
        match self {
            NewRoleRecord::Student { registration_id, .. }
            | NewRoleRecord::Teacher { registration_id, .. } => Some(registration_id.clone()),
            NewRoleRecord::Admin => None,
        }
    }

    fn save(&self, state: &AppState, user_id: &str) -> StorageResult<()> {
        match self {
            NewRoleRecord::Student {
                registration_id,
                class,
            } => StudentRepository::new(state.storage(), state.index())
                .create(&StudentRecord::new(user_id, registration_id, *class)),
            NewRoleRecord::Teacher {
                registration_id,
                subject,
                classes,
            } => TeacherRepository::new(state.storage(), state.index()).create(
                &TeacherRecord::new(user_id, registration_id, subject.clone(), classes.clone()),
            ),
            NewRoleRecord::Admin => Ok(()),
        }
    }
}

/// Role record write planned by an account update.
enum RoleRecordChange {
    Unchanged,
    Student {
        record: StudentRecord,
        create: bool,
        sync_registration: bool,
    },
    Teacher {
        record: TeacherRecord,
        create: bool,
        sync_registration: bool,
    },
}

impl RoleRecordChange {
    fn for_student(
        current: Option<StudentRecord>,
        user_id: &str,
        registration_id: Option<&str>,
        new_class: Option<ClassId>,
    ) -> Result<Self, ApiError> {
        match current {
            Some(mut record) => {
                if let Some(reg) = registration_id {
                    record.registration_id = name_key(reg);
                }
                if let Some(class) = new_class {
                    record.enrolled_class = class;
                }
                record.updated_at = Utc::now();
                Ok(RoleRecordChange::Student {
                    record,
                    create: false,
                    sync_registration: registration_id.is_some(),
                })
            }
            None => match (registration_id, new_class) {
                (Some(reg), Some(class)) => Ok(RoleRecordChange::Student {
                    record: StudentRecord::new(user_id, reg, class),
                    create: true,
                    sync_registration: true,
                }),
                (None, None) => Ok(RoleRecordChange::Unchanged),
                _ => Err(ApiError::bad_request(
                    "registration_id and class are both required to enroll a student",
                )),
            },
        }
    }

    fn for_teacher(
        current: Option<TeacherRecord>,
        user_id: &str,
        registration_id: Option<&str>,
        req: &UpdateUserRequest,
    ) -> Result<Self, ApiError> {
        let classes = req.classes.as_deref().map(class_set).transpose()?;
        let subject = req
            .subject
            .as_deref()
            .map(|s| non_empty(s, "subject"))
            .transpose()?;

        match current {
            Some(mut record) => {
                if let Some(reg) = registration_id {
                    record.registration_id = name_key(reg);
                }
                if let Some(subject) = subject {
                    record.subject = subject;
                }
                if let Some(classes) = classes {
                    record.assigned_classes = classes;
                }
                record.updated_at = Utc::now();
                Ok(RoleRecordChange::Teacher {
                    record,
                    create: false,
                    sync_registration: registration_id.is_some(),
                })
            }
            None => match (registration_id, subject) {
                (Some(reg), Some(subject)) => Ok(RoleRecordChange::Teacher {
                    record: TeacherRecord::new(user_id, reg, subject, classes.unwrap_or_default()),
                    create: true,
                    sync_registration: true,
                }),
                _ => Ok(RoleRecordChange::Unchanged),
            },
        }
    }

    fn apply(&self, state: &AppState, user_id: &str) -> StorageResult<()> {
        match self {
            RoleRecordChange::Unchanged => Ok(()),
            RoleRecordChange::Student {
                record,
                create,
                sync_registration,
            } => {
                let students = StudentRepository::new(state.storage(), state.index());
                if *create {
                    students.create(record)?;
                } else {
                    students.update(record)?;
                }
                if *sync_registration {
                    sync_profile_registration(state, user_id, &record.registration_id)?;
                }
                Ok(())
            }
            RoleRecordChange::Teacher {
                record,
                create,
                sync_registration,
            } => {
                let teachers = TeacherRepository::new(state.storage(), state.index());
                if *create {
                    teachers.create(record)?;
                } else {
                    teachers.update(record)?;
                }
                if *sync_registration {
                    sync_profile_registration(state, user_id, &record.registration_id)?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

pub(crate) fn non_empty(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !email.contains(char::is_whitespace);
    if !valid {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    Ok(email.to_string())
}

pub(crate) fn password_hash(password: &str) -> Result<String, ApiError> {
    validate_password_strength(password).map_err(ApiError::bad_request)?;
    hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        ApiError::internal("Failed to hash password")
    })
}

fn class_set(classes: &[i64]) -> Result<BTreeSet<ClassId>, ApiError> {
    classes
        .iter()
        .map(|c| ClassId::new(*c).map_err(ApiError::from))
        .collect()
}

/// Descriptor for a change to an account.
///
/// A student without an enrollment record is in no class, so only admins may
/// change it.
fn account_resource(role: Role, target: Option<StudentTarget>) -> Resource {
    match (role, target) {
        (Role::Student, None) => Resource::Admin,
        (role, target) => Resource::account(role, target),
    }
}

fn sync_profile_registration(state: &AppState, user_id: &str, registration_id: &str) -> StorageResult<()> {
    let profiles = ProfileRepository::new(state.storage());
    let mut profile = profiles
        .find(user_id)?
        .unwrap_or_else(|| ProfileRecord::new(user_id, None));
    profile.registration_id = Some(registration_id.to_string());
    profile.updated_at = Utc::now();
    profiles.save(&profile)
}

// ============================================================================
// Handlers
// ============================================================================

/// List users visible to the caller.
///
/// Teachers see the students of their assigned classes and the teacher
/// roster; students see only themselves. Admins see everyone.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(ListUsersQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Visible users", body = [UserDetails]),
        (status = 400, description = "Unknown user type"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_users(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Vec<UserDetails>> {
    let caller = Caller::load(&state, &user)?;

    let roles: Vec<Role> = match query.user_type.as_deref().map(str::trim) {
        None | Some("") => Role::ALL.to_vec(),
        Some(kind) => vec![Role::parse(kind)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown userType: {kind}")))?],
    };

    let users = UserRepository::new(state.storage(), state.index());
    let mut visible = Vec::new();
    for role in roles {
        let scope = caller.authorize(&state, Action::List, &Resource::account(role, None))?;
        if scope.is_empty() {
            continue;
        }
        let details = details_for(&state, users.list_by_role(role)?)?;
        visible.extend(scope.retain(details));
    }
    visible.sort_by(|a, b| a.user.name.cmp(&b.user.name));

    Ok(ok(visible))
}

/// Get one user.
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User", body = UserDetails),
        (status = 404, description = "User not found or not visible")
    )
)]
pub async fn get_user(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserDetails> {
    let caller = Caller::load(&state, &user)?;
    let target = UserRepository::new(state.storage(), state.index())
        .find(&user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let scope = caller.authorize(&state, Action::Read, &Resource::account(target.role, None))?;
    let details = UserDetails::load(&state, &target)?;
    if !scope.admits(&details) {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(ok(details))
}

/// Create a user with its role record and an empty profile.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "User created", body = UserDetails),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not allowed to create this user"),
        (status = 409, description = "Email or registration id already in use")
    )
)]
pub async fn create_user(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Created<UserDetails> {
    let caller = Caller::load(&state, &user)?;

    let name = non_empty(&req.name, "name")?;
    let email = validate_email(&req.email)?;
    let role_record = NewRoleRecord::from_request(&req)?;
    let target = match &role_record {
        NewRoleRecord::Student { class, .. } => Some(StudentTarget {
            enrolled_class: *class,
            move_to: None,
        }),
        _ => None,
    };
    caller.authorize(&state, Action::Create, &Resource::account(req.role, target))?;

    let account = StoredUser::new(name, email, password_hash(&req.password)?, req.role);
    let users = UserRepository::new(state.storage(), state.index());
    users.create(&account)?;

    if let Err(e) = role_record.save(&state, &account.id) {
        // Leave no half-created account behind.
        let _ = users.delete(&account.id);
        return Err(e.into());
    }
    ProfileRepository::new(state.storage())
        .save(&ProfileRecord::new(&account.id, role_record.registration_id()))?;

    tracing::info!(
        user_id = %account.id,
        role = %account.role,
        created_by = %caller.user_id(),
        "User created"
    );
    audit_log!(state.storage(), AuditEventType::UserCreated, &user, "user", &account.id);

    Ok(created(UserDetails::load(&state, &account)?))
}

/// Update account fields and role data.
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated", body = UserDetails),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not allowed to change this user"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email or registration id already in use")
    )
)]
pub async fn update_user(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<UserDetails> {
    let caller = Caller::load(&state, &user)?;
    let users = UserRepository::new(state.storage(), state.index());
    let students = StudentRepository::new(state.storage(), state.index());
    let teachers = TeacherRepository::new(state.storage(), state.index());

    let mut account = users
        .find(&user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let student = match account.role {
        Role::Student => students.find(&user_id)?,
        _ => None,
    };

    let new_class = req.class.map(ClassId::new).transpose()?;
    let target = student.as_ref().map(|s| StudentTarget {
        enrolled_class: s.enrolled_class,
        move_to: new_class.filter(|c| *c != s.enrolled_class),
    });
    caller.authorize(&state, Action::Update, &account_resource(account.role, target))?;

    let registration_id = req
        .registration_id
        .as_deref()
        .map(|r| non_empty(r, "registration_id"))
        .transpose()?;

    let original = account.clone();
    if let Some(name) = &req.name {
        account.name = non_empty(name, "name")?;
    }
    if let Some(email) = &req.email {
        account.email = validate_email(email)?;
    }
    if let Some(password) = &req.password {
        account.password_hash = password_hash(password)?;
    }
    if let Some(status) = req.status {
        account.status = status;
    }

    let change = match account.role {
        Role::Student => RoleRecordChange::for_student(
            student,
            &user_id,
            registration_id.as_deref(),
            new_class,
        )?,
        Role::Teacher => RoleRecordChange::for_teacher(
            teachers.find(&user_id)?,
            &user_id,
            registration_id.as_deref(),
            &req,
        )?,
        Role::Admin => RoleRecordChange::Unchanged,
    };

    // The account write claims the new email; role records follow it.
    account.updated_at = Utc::now();
    users.update(&account)?;
    if let Err(e) = change.apply(&state, &user_id) {
        if let Err(rollback) = users.update(&original) {
            tracing::error!(user_id = %user_id, error = %rollback, "Failed to roll back account update");
        }
        return Err(e.into());
    }

    tracing::info!(user_id = %account.id, updated_by = %caller.user_id(), "User updated");
    audit_log!(state.storage(), AuditEventType::UserUpdated, &user, "user", &account.id);

    Ok(ok(UserDetails::load(&state, &account)?))
}

/// Delete a user with its profile and role record. Marks are kept.
#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Cannot delete own account"),
        (status = 403, description = "Not allowed to delete this user"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let caller = Caller::load(&state, &user)?;
    if user_id == caller.user_id() {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let users = UserRepository::new(state.storage(), state.index());
    let students = StudentRepository::new(state.storage(), state.index());
    let account = users
        .find(&user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let target = match account.role {
        Role::Student => students.find(&user_id)?.map(|s| StudentTarget {
            enrolled_class: s.enrolled_class,
            move_to: None,
        }),
        _ => None,
    };
    caller.authorize(&state, Action::Delete, &account_resource(account.role, target))?;

    users.delete(&user_id)?;
    students.delete(&user_id)?;
    TeacherRepository::new(state.storage(), state.index()).delete(&user_id)?;
    if let Some(profile) = ProfileRepository::new(state.storage()).delete(&user_id)? {
        if let Some(name) = profile.uploaded_image() {
            remove_upload(&state, name);
        }
    }
    PasswordResetRepository::new(state.storage()).revoke(&user_id)?;

    tracing::info!(user_id = %user_id, deleted_by = %caller.user_id(), "User deleted");
    audit_log!(state.storage(), AuditEventType::UserDeleted, &user, "user", &user_id);

    Ok(message("User deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{seed_admin, seed_student, seed_teacher};
    use crate::state::testing::test_state;
    use axum::http::StatusCode;

    fn student_request(email: &str, reg: &str, class: i64) -> CreateUserRequest {
        CreateUserRequest {
            name: "New Student".into(),
            email: email.into(),
            password: "secret123".into(),
            role: Role::Student,
            registration_id: Some(reg.into()),
            class: Some(class),
            subject: None,
            classes: Vec::new(),
        }
    }

    async fn list(state: &AppState, user: &crate::auth::AuthenticatedUser, kind: Option<&str>) -> Vec<UserDetails> {
        list_users(
            Auth(user.clone()),
            State(state.clone()),
            Query(ListUsersQuery {
                user_type: kind.map(str::to_string),
            }),
        )
        .await
        .unwrap()
        .0
        .data
    }

    #[tokio::test]
    async fn teacher_lists_only_students_of_assigned_classes() {
        let (_temp, state) = test_state();
        let teacher = seed_teacher(&state, "T-01", &[10, 11]);
        seed_student(&state, "S-10", 10);
        seed_student(&state, "S-11", 11);
        seed_student(&state, "S-12", 12);

        let students = list(&state, &teacher, Some("Student")).await;
        let regs: BTreeSet<_> = students
            .iter()
            .filter_map(|s| s.registration_id.clone())
            .collect();
        assert_eq!(regs, BTreeSet::from(["S-10".to_string(), "S-11".to_string()]));
    }

    #[tokio::test]
    async fn unassigned_teacher_gets_empty_list() {
        let (_temp, state) = test_state();
        let teacher = seed_teacher(&state, "T-01", &[]);
        seed_student(&state, "S-10", 10);

        assert!(list(&state, &teacher, Some("Student")).await.is_empty());
    }

    #[tokio::test]
    async fn student_sees_only_self() {
        let (_temp, state) = test_state();
        let me = seed_student(&state, "S-10", 10);
        seed_student(&state, "S-11", 10);
        seed_teacher(&state, "T-01", &[10]);
        seed_admin(&state);

        let visible = list(&state, &me, None).await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].user.id, me.user_id);
    }

    #[tokio::test]
    async fn admin_filters_by_type_and_rejects_unknown_type() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        seed_student(&state, "S-10", 10);
        seed_teacher(&state, "T-01", &[10]);

        assert_eq!(list(&state, &admin, None).await.len(), 3);
        assert_eq!(list(&state, &admin, Some("teacher")).await.len(), 1);

        let err = list_users(
            Auth(admin),
            State(state),
            Query(ListUsersQuery {
                user_type: Some("Janitor".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn teacher_creates_students_only_in_assigned_classes() {
        let (_temp, state) = test_state();
        let teacher = seed_teacher(&state, "T-01", &[10]);

        let (status, body) = create_user(
            Auth(teacher.clone()),
            State(state.clone()),
            Json(student_request("in@school.test", "S-100", 10)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.0.data.enrolled_class, Some(ClassId::new(10).unwrap()));

        let err = create_user(
            Auth(teacher),
            State(state),
            Json(student_request("out@school.test", "S-101", 12)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn class_zero_is_rejected() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);

        let err = create_user(
            Auth(admin),
            State(state),
            Json(student_request("zero@school.test", "S-0", 0)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_registration_rolls_back_account() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        seed_student(&state, "S-10", 10);

        let err = create_user(
            Auth(admin),
            State(state.clone()),
            Json(student_request("dup@school.test", "S-10", 10)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert!(UserRepository::new(state.storage(), state.index())
            .find_by_email("dup@school.test")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn moving_a_student_needs_both_classes_assigned() {
        let (_temp, state) = test_state();
        let teacher = seed_teacher(&state, "T-01", &[10, 11]);
        let student = seed_student(&state, "S-10", 10);

        let move_to = |class| UpdateUserRequest {
            class: Some(class),
            ..Default::default()
        };

        let err = update_user(
            Auth(teacher.clone()),
            State(state.clone()),
            Path(student.user_id.clone()),
            Json(move_to(12)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let moved = update_user(
            Auth(teacher),
            State(state),
            Path(student.user_id.clone()),
            Json(move_to(11)),
        )
        .await
        .unwrap();
        assert_eq!(moved.0.data.enrolled_class, Some(ClassId::new(11).unwrap()));
    }

    #[tokio::test]
    async fn email_conflict_leaves_enrollment_unchanged() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let student = seed_student(&state, "S-10", 10);
        seed_student(&state, "S-11", 11);

        let err = update_user(
            Auth(admin),
            State(state.clone()),
            Path(student.user_id.clone()),
            Json(UpdateUserRequest {
                class: Some(12),
                email: Some("s-11@school.test".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let record = StudentRepository::new(state.storage(), state.index())
            .find(&student.user_id)
            .unwrap()
            .unwrap();
        assert_eq!(record.enrolled_class, ClassId::new(10).unwrap());
    }

    #[tokio::test]
    async fn registration_conflict_rolls_back_account_fields() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let student = seed_student(&state, "S-10", 10);
        seed_student(&state, "S-11", 11);

        let err = update_user(
            Auth(admin),
            State(state.clone()),
            Path(student.user_id.clone()),
            Json(UpdateUserRequest {
                email: Some("renamed@school.test".into()),
                registration_id: Some("S-11".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let users = UserRepository::new(state.storage(), state.index());
        assert_eq!(users.get(&student.user_id).unwrap().email, "s-10@school.test");
        assert!(users.find_by_email("renamed@school.test").unwrap().is_none());
    }

    #[tokio::test]
    async fn only_admin_enrolls_unenrolled_student() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let teacher = seed_teacher(&state, "T-01", &[10]);
        let orphan = StoredUser::new(
            "Orphan",
            "orphan@school.test",
            hash_password("secret123").unwrap(),
            Role::Student,
        );
        UserRepository::new(state.storage(), state.index())
            .create(&orphan)
            .unwrap();

        let enroll = || UpdateUserRequest {
            registration_id: Some("S-20".into()),
            class: Some(10),
            ..Default::default()
        };

        let err = update_user(
            Auth(teacher),
            State(state.clone()),
            Path(orphan.id.clone()),
            Json(enroll()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(StudentRepository::new(state.storage(), state.index())
            .find(&orphan.id)
            .unwrap()
            .is_none());

        let enrolled = update_user(Auth(admin), State(state), Path(orphan.id), Json(enroll()))
            .await
            .unwrap();
        assert_eq!(enrolled.0.data.enrolled_class, Some(ClassId::new(10).unwrap()));
    }

    #[tokio::test]
    async fn teacher_cannot_delete_student_of_other_class() {
        let (_temp, state) = test_state();
        let teacher = seed_teacher(&state, "T-01", &[10, 11]);
        let student = seed_student(&state, "S-12", 12);

        let err = delete_user(Auth(teacher), State(state), Path(student.user_id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(err.message.contains("out-of-scope class"));
    }

    #[tokio::test]
    async fn admin_delete_removes_role_record_and_profile() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let student = seed_student(&state, "S-10", 10);

        delete_user(Auth(admin), State(state.clone()), Path(student.user_id.clone()))
            .await
            .unwrap();

        assert!(StudentRepository::new(state.storage(), state.index())
            .find_by_registration("S-10")
            .unwrap()
            .is_none());
        assert!(ProfileRepository::new(state.storage())
            .find(&student.user_id)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn hidden_user_reads_as_not_found() {
        let (_temp, state) = test_state();
        let teacher = seed_teacher(&state, "T-01", &[10]);
        let other = seed_student(&state, "S-12", 12);

        let err = get_user(Auth(teacher), State(state), Path(other.user_id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = StoredUser::new("A", "a@b.test", "$argon2id$secret".into(), Role::Admin);
        let details = UserDetails::build(&user, None, None);
        let json = serde_json::to_string(&details).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"email\":\"a@b.test\""));
    }
}
