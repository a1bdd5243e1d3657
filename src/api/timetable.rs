// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Class timetable endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::guard::Caller;
use super::response::{ok, ApiResult};
use crate::{
    access::{Action, ClassId, Resource},
    audit_log,
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{AuditEventType, ClassTimetable, TimetableRepository, TimetableSlot},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTimetableRequest {
    /// Day name to the slots of that day.
    pub timetable: BTreeMap<String, Vec<TimetableSlot>>,
}

/// Every class timetable, ordered by class.
#[utoipa::path(
    get,
    path = "/api/timetable",
    tag = "Timetable",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All timetables", body = [ClassTimetable]))
)]
pub async fn list(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> ApiResult<Vec<ClassTimetable>> {
    let caller = Caller::load(&state, &user)?;
    let scope = caller.authorize(&state, Action::List, &Resource::Timetable)?;
    if scope.is_empty() {
        return Ok(ok(Vec::new()));
    }
    Ok(ok(TimetableRepository::new(state.storage()).list_all()?))
}

#[utoipa::path(
    get,
    path = "/api/timetable/{class}",
    tag = "Timetable",
    params(("class" = u32, Path, description = "Class number")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Timetable of the class", body = ClassTimetable),
        (status = 400, description = "Invalid class"),
        (status = 404, description = "No timetable for the class")
    )
)]
pub async fn get(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(class): Path<i64>,
) -> ApiResult<ClassTimetable> {
    let caller = Caller::load(&state, &user)?;
    let class = ClassId::new(class)?;
    caller.authorize(&state, Action::Read, &Resource::Timetable)?;

    let timetable = TimetableRepository::new(state.storage())
        .find(class)?
        .ok_or_else(|| ApiError::not_found(format!("No timetable for class {class}")))?;
    Ok(ok(timetable))
}

/// Replace the timetable of a class. Admin only.
#[utoipa::path(
    put,
    path = "/api/timetable/{class}",
    tag = "Timetable",
    params(("class" = u32, Path, description = "Class number")),
    request_body = UpdateTimetableRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Timetable saved", body = ClassTimetable),
        (status = 400, description = "Invalid class or slot"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn upsert(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(class): Path<i64>,
    Json(req): Json<UpdateTimetableRequest>,
) -> ApiResult<ClassTimetable> {
    let caller = Caller::load(&state, &user)?;
    let class = ClassId::new(class)?;
    caller.authorize(&state, Action::Update, &Resource::Timetable)?;

    let mut days = BTreeMap::new();
    for (day, slots) in req.timetable {
        let day = day.trim().to_string();
        if day.is_empty() {
            return Err(ApiError::bad_request("day name is required"));
        }
        if slots.iter().any(|s| s.time.trim().is_empty() || s.subject.trim().is_empty()) {
            return Err(ApiError::bad_request(format!(
                "every slot on {day} needs a time and a subject"
            )));
        }
        days.insert(day, slots);
    }

    let timetable = TimetableRepository::new(state.storage()).upsert(class, days)?;

    tracing::info!(class = %class, "Timetable updated");
    audit_log!(
        state.storage(),
        AuditEventType::TimetableUpdated,
        &user,
        "timetable",
        class.to_string()
    );

    Ok(ok(timetable))
}
