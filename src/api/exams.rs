// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exam endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use super::guard::Caller;
use super::response::{created, message, ok, ApiResult, Created, MessageResponse};
use super::users::non_empty;
use crate::{
    access::{Action, Resource},
    audit_log,
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{AuditEventType, ExamRecord, ExamRepository, StorageError},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateExamRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateExamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn load(state: &AppState, exam_id: &str) -> Result<ExamRecord, ApiError> {
    ExamRepository::new(state.storage(), state.index())
        .get(exam_id)
        .map_err(|e| match e {
            StorageError::NotFound(_) => ApiError::not_found("Exam not found"),
            other => other.into(),
        })
}

#[utoipa::path(
    get,
    path = "/api/exams",
    tag = "Exams",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All exams", body = [ExamRecord]))
)]
pub async fn list(Auth(user): Auth, State(state): State<AppState>) -> ApiResult<Vec<ExamRecord>> {
    let caller = Caller::load(&state, &user)?;
    let scope = caller.authorize(&state, Action::List, &Resource::Exam)?;
    let exams = ExamRepository::new(state.storage(), state.index()).list_all()?;
    Ok(ok(if scope.is_empty() { Vec::new() } else { exams }))
}

#[utoipa::path(
    get,
    path = "/api/exams/{exam_id}",
    tag = "Exams",
    params(("exam_id" = String, Path, description = "Exam ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Exam", body = ExamRecord),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn get(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> ApiResult<ExamRecord> {
    let caller = Caller::load(&state, &user)?;
    caller.authorize(&state, Action::Read, &Resource::Exam)?;
    Ok(ok(load(&state, &exam_id)?))
}

#[utoipa::path(
    post,
    path = "/api/exams",
    tag = "Exams",
    request_body = CreateExamRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Exam created", body = ExamRecord),
        (status = 400, description = "Name is empty"),
        (status = 403, description = "Students cannot create exams"),
        (status = 409, description = "Exam name already in use")
    )
)]
pub async fn create(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<CreateExamRequest>,
) -> Created<ExamRecord> {
    let caller = Caller::load(&state, &user)?;
    caller.authorize(&state, Action::Create, &Resource::Exam)?;

    let name = non_empty(&req.name, "name")?;
    let exam = ExamRecord::new(&name, req.description.trim(), caller.user_id());
    ExamRepository::new(state.storage(), state.index()).create(&exam)?;

    tracing::info!(exam_id = %exam.id, name = %exam.name, "Exam created");
    audit_log!(state.storage(), AuditEventType::ExamCreated, &user, "exam", &exam.id);

    Ok(created(exam))
}

#[utoipa::path(
    put,
    path = "/api/exams/{exam_id}",
    tag = "Exams",
    params(("exam_id" = String, Path, description = "Exam ID")),
    request_body = UpdateExamRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Exam updated", body = ExamRecord),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Exam not found"),
        (status = 409, description = "Exam name already in use")
    )
)]
pub async fn update(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
    Json(req): Json<UpdateExamRequest>,
) -> ApiResult<ExamRecord> {
    let caller = Caller::load(&state, &user)?;
    caller.authorize(&state, Action::Update, &Resource::Exam)?;

    let mut exam = load(&state, &exam_id)?;
    if let Some(name) = &req.name {
        exam.name = non_empty(name, "name")?;
    }
    if let Some(description) = &req.description {
        exam.description = description.trim().to_string();
    }
    exam.updated_at = Utc::now();
    ExamRepository::new(state.storage(), state.index()).update(&exam)?;

    audit_log!(state.storage(), AuditEventType::ExamUpdated, &user, "exam", &exam.id);

    Ok(ok(exam))
}

#[utoipa::path(
    delete,
    path = "/api/exams/{exam_id}",
    tag = "Exams",
    params(("exam_id" = String, Path, description = "Exam ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Exam deleted", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Exam not found")
    )
)]
pub async fn delete(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let caller = Caller::load(&state, &user)?;
    caller.authorize(&state, Action::Delete, &Resource::Exam)?;

    let exam = load(&state, &exam_id)?;
    ExamRepository::new(state.storage(), state.index()).delete(&exam.id)?;

    audit_log!(state.storage(), AuditEventType::ExamDeleted, &user, "exam", &exam.id);

    Ok(message("Exam deleted successfully"))
}
