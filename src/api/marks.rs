// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mark endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::guard::Caller;
use super::response::{created, message, ok, ApiResult, Created, MessageResponse};
use super::users::non_empty;
use crate::{
    access::{Action, ClassId, MarkTarget, Resource},
    audit_log,
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{
        index::name_key, AuditEventType, MarkFilter, MarkRecord, MarkRepository,
        StudentRepository, MAX_SCORE,
    },
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MarkQuery {
    pub exam: Option<String>,
    /// `0` or absent means every class.
    pub class: Option<i64>,
    /// Registration id of the student.
    pub reg: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentMarkQuery {
    /// Required when the caller is a student.
    pub exam: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMarkRequest {
    pub registration_id: String,
    pub subject: String,
    pub exam: String,
    pub score: i64,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateMarkRequest {
    pub score: Option<i64>,
    pub remarks: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn score(value: i64) -> Result<u8, ApiError> {
    u8::try_from(value)
        .ok()
        .filter(|s| *s <= MAX_SCORE)
        .ok_or_else(|| ApiError::bad_request(format!("score must be between 0 and {MAX_SCORE}")))
}

fn list_marks(
    state: &AppState,
    caller: &Caller,
    filter: MarkFilter,
) -> Result<Vec<MarkRecord>, ApiError> {
    let scope = caller.authorize(
        state,
        Action::List,
        &Resource::Mark(MarkTarget {
            class: None,
            exam: filter.exam.clone(),
        }),
    )?;
    Ok(MarkRepository::new(state.storage(), state.index()).list(&filter, &scope)?)
}

/// List marks visible to the caller.
#[utoipa::path(
    get,
    path = "/api/marks",
    tag = "Marks",
    params(MarkQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Marks, newest first", body = [MarkRecord]),
        (status = 400, description = "Students must give an exam")
    )
)]
pub async fn list(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<MarkQuery>,
) -> ApiResult<Vec<MarkRecord>> {
    let caller = Caller::load(&state, &user)?;
    let filter = MarkFilter {
        exam: trimmed(query.exam),
        class: ClassId::filter(query.class)?,
        registration_id: trimmed(query.reg).map(|r| name_key(&r)),
        subject: trimmed(query.subject),
    };
    Ok(ok(list_marks(&state, &caller, filter)?))
}

/// Marks of one student.
#[utoipa::path(
    get,
    path = "/api/marks/student/{reg}",
    tag = "Marks",
    params(("reg" = String, Path, description = "Registration id"), StudentMarkQuery),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Marks of the student", body = [MarkRecord]))
)]
pub async fn list_for_student(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(reg): Path<String>,
    Query(query): Query<StudentMarkQuery>,
) -> ApiResult<Vec<MarkRecord>> {
    let caller = Caller::load(&state, &user)?;
    let filter = MarkFilter {
        exam: trimmed(query.exam),
        registration_id: Some(name_key(&reg)),
        ..Default::default()
    };
    Ok(ok(list_marks(&state, &caller, filter)?))
}

/// Record a mark for a student.
///
/// The class comes from the student's current enrollment.
#[utoipa::path(
    post,
    path = "/api/marks",
    tag = "Marks",
    request_body = CreateMarkRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Mark recorded", body = MarkRecord),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Student is outside the caller's classes"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "A mark already exists for this student, subject and exam")
    )
)]
pub async fn create(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<CreateMarkRequest>,
) -> Created<MarkRecord> {
    let caller = Caller::load(&state, &user)?;
    let score = score(req.score)?;
    let subject = non_empty(&req.subject, "subject")?;
    let exam = non_empty(&req.exam, "exam")?;

    let student = StudentRepository::new(state.storage(), state.index())
        .find_by_registration(&req.registration_id)?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;

    caller.authorize(
        &state,
        Action::Create,
        &Resource::Mark(MarkTarget {
            class: Some(student.enrolled_class),
            exam: Some(exam.clone()),
        }),
    )?;

    let mut mark = MarkRecord::new(
        student.registration_id,
        student.enrolled_class,
        &subject,
        &exam,
        score,
        caller.user_id(),
    );
    mark.remarks = req.remarks.trim().to_string();
    MarkRepository::new(state.storage(), state.index()).create(&mark)?;

    tracing::info!(
        mark_id = %mark.id,
        registration_id = %mark.registration_id,
        class = %mark.class,
        "Mark recorded"
    );
    audit_log!(state.storage(), AuditEventType::MarkRecorded, &user, "mark", &mark.id);

    Ok(created(mark))
}

/// Change the score or remarks of a mark.
#[utoipa::path(
    put,
    path = "/api/marks/{mark_id}",
    tag = "Marks",
    params(("mark_id" = String, Path, description = "Mark ID")),
    request_body = UpdateMarkRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Mark updated", body = MarkRecord),
        (status = 403, description = "Mark is outside the caller's classes"),
        (status = 404, description = "Mark not found")
    )
)]
pub async fn update(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(mark_id): Path<String>,
    Json(req): Json<UpdateMarkRequest>,
) -> ApiResult<MarkRecord> {
    let caller = Caller::load(&state, &user)?;
    let marks = MarkRepository::new(state.storage(), state.index());
    let mut mark = marks
        .find(&mark_id)?
        .ok_or_else(|| ApiError::not_found("Mark not found"))?;

    caller.authorize(
        &state,
        Action::Update,
        &Resource::Mark(MarkTarget {
            class: Some(mark.class),
            exam: Some(mark.exam.clone()),
        }),
    )?;

    if let Some(value) = req.score {
        mark.score = score(value)?;
    }
    if let Some(remarks) = req.remarks {
        mark.remarks = remarks.trim().to_string();
    }
    mark.last_updated = Utc::now();
    marks.update(&mark)?;

    audit_log!(state.storage(), AuditEventType::MarkUpdated, &user, "mark", &mark.id);

    Ok(ok(mark))
}

/// Delete a mark. Admin only.
#[utoipa::path(
    delete,
    path = "/api/marks/{mark_id}",
    tag = "Marks",
    params(("mark_id" = String, Path, description = "Mark ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Mark deleted", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Mark not found")
    )
)]
pub async fn delete(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(mark_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let caller = Caller::load(&state, &user)?;
    let marks = MarkRepository::new(state.storage(), state.index());
    let mark = marks
        .find(&mark_id)?
        .ok_or_else(|| ApiError::not_found("Mark not found"))?;

    caller.authorize(
        &state,
        Action::Delete,
        &Resource::Mark(MarkTarget {
            class: Some(mark.class),
            exam: Some(mark.exam.clone()),
        }),
    )?;
    marks.delete(&mark.id)?;

    audit_log!(state.storage(), AuditEventType::MarkDeleted, &user, "mark", &mark.id);

    Ok(message("Mark deleted successfully"))
}
