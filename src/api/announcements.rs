// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Announcement endpoints.
//!
//! Who may publish where is decided from the audience: teachers address the
//! whole school, staff, or the classes they are assigned to.

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
    access::{AnnouncementTarget, Audience, Action, Resource, Visibility},
    audit_log,
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{AnnouncementRecord, AnnouncementRepository, AuditEventType, StorageError},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    /// Required for `Class` and `Student` visibility.
    pub class: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub class: Option<i64>,
}

impl UpdateAnnouncementRequest {
    /// Audience after the update. A new visibility without a class keeps the
    /// stored class.
    fn audience(&self, current: &AnnouncementRecord) -> Result<Audience, ApiError> {
        let visibility = self.visibility.unwrap_or(current.visibility);
        let class = self
            .class
            .or_else(|| current.class.map(|c| i64::from(c.get())));
        Ok(Audience::new(visibility, class)?)
    }
}

fn find(state: &AppState, id: &str) -> Result<AnnouncementRecord, ApiError> {
    AnnouncementRepository::new(state.storage())
        .get(id)
        .map_err(|e| match e {
            StorageError::NotFound(_) => ApiError::not_found("Announcement not found"),
            other => other.into(),
        })
}

/// Announcements addressed to the caller, newest first.
#[utoipa::path(
    get,
    path = "/api/announcements",
    tag = "Announcements",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Visible announcements", body = [AnnouncementRecord]))
)]
pub async fn list(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> ApiResult<Vec<AnnouncementRecord>> {
    let caller = Caller::load(&state, &user)?;
    let scope = caller.authorize(
        &state,
        Action::List,
        &Resource::Announcement(AnnouncementTarget::default()),
    )?;
    Ok(ok(AnnouncementRepository::new(state.storage()).list(&scope)?))
}

#[utoipa::path(
    get,
    path = "/api/announcements/{announcement_id}",
    tag = "Announcements",
    params(("announcement_id" = String, Path, description = "Announcement ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Announcement", body = AnnouncementRecord),
        (status = 404, description = "Not found or not addressed to the caller")
    )
)]
pub async fn get(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(announcement_id): Path<String>,
) -> ApiResult<AnnouncementRecord> {
    let caller = Caller::load(&state, &user)?;
    let announcement = find(&state, &announcement_id)?;

    let scope = caller.authorize(
        &state,
        Action::Read,
        &Resource::Announcement(AnnouncementTarget {
            current: Some(announcement.audience()?),
            requested: None,
        }),
    )?;
    if !scope.admits(&announcement) {
        return Err(ApiError::not_found("Announcement not found"));
    }
    Ok(ok(announcement))
}

#[utoipa::path(
    post,
    path = "/api/announcements",
    tag = "Announcements",
    request_body = CreateAnnouncementRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Announcement published", body = AnnouncementRecord),
        (status = 400, description = "Missing or invalid target class"),
        (status = 403, description = "Audience outside the caller's classes")
    )
)]
pub async fn create(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Created<AnnouncementRecord> {
    let caller = Caller::load(&state, &user)?;
    let title = non_empty(&req.title, "title")?;
    let audience = Audience::new(req.visibility, req.class)?;

    caller.authorize(
        &state,
        Action::Create,
        &Resource::Announcement(AnnouncementTarget {
            current: None,
            requested: Some(audience),
        }),
    )?;

    let announcement =
        AnnouncementRecord::new(title, req.description.trim(), audience, caller.user_id());
    AnnouncementRepository::new(state.storage()).save(&announcement)?;

    tracing::info!(
        announcement_id = %announcement.id,
        visibility = ?announcement.visibility,
        "Announcement published"
    );
    audit_log!(
        state.storage(),
        AuditEventType::AnnouncementPublished,
        &user,
        "announcement",
        &announcement.id
    );

    Ok(created(announcement))
}

#[utoipa::path(
    put,
    path = "/api/announcements/{announcement_id}",
    tag = "Announcements",
    params(("announcement_id" = String, Path, description = "Announcement ID")),
    request_body = UpdateAnnouncementRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Announcement updated", body = AnnouncementRecord),
        (status = 403, description = "Current or new audience outside the caller's classes"),
        (status = 404, description = "Announcement not found")
    )
)]
pub async fn update(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(announcement_id): Path<String>,
    Json(req): Json<UpdateAnnouncementRequest>,
) -> ApiResult<AnnouncementRecord> {
    let caller = Caller::load(&state, &user)?;
    let mut announcement = find(&state, &announcement_id)?;
    let requested = req.audience(&announcement)?;

    caller.authorize(
        &state,
        Action::Update,
        &Resource::Announcement(AnnouncementTarget {
            current: Some(announcement.audience()?),
            requested: Some(requested),
        }),
    )?;

    if let Some(title) = &req.title {
        announcement.title = non_empty(title, "title")?;
    }
    if let Some(description) = &req.description {
        announcement.description = description.trim().to_string();
    }
    announcement.set_audience(requested);
    announcement.last_updated = Utc::now();
    AnnouncementRepository::new(state.storage()).save(&announcement)?;

    audit_log!(
        state.storage(),
        AuditEventType::AnnouncementUpdated,
        &user,
        "announcement",
        &announcement.id
    );

    Ok(ok(announcement))
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{announcement_id}",
    tag = "Announcements",
    params(("announcement_id" = String, Path, description = "Announcement ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Announcement deleted", body = MessageResponse),
        (status = 403, description = "Audience outside the caller's classes"),
        (status = 404, description = "Announcement not found")
    )
)]
pub async fn delete(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(announcement_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let caller = Caller::load(&state, &user)?;
    let announcement = find(&state, &announcement_id)?;

    caller.authorize(
        &state,
        Action::Delete,
        &Resource::Announcement(AnnouncementTarget {
            current: Some(announcement.audience()?),
            requested: None,
        }),
    )?;
    AnnouncementRepository::new(state.storage()).delete(&announcement.id)?;

    audit_log!(
        state.storage(),
        AuditEventType::AnnouncementDeleted,
        &user,
        "announcement",
        &announcement.id
    );

    Ok(message("Announcement deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{seed_admin, seed_student, seed_teacher};
    use crate::auth::AuthenticatedUser;
    use crate::state::testing::test_state;
    use axum::http::StatusCode;

    fn request(visibility: Visibility, class: Option<i64>) -> CreateAnnouncementRequest {
        CreateAnnouncementRequest {
            title: "Sports day".into(),
            description: "Friday".into(),
            visibility,
            class,
        }
    }

    async fn publish(
        state: &AppState,
        user: &AuthenticatedUser,
        visibility: Visibility,
        class: Option<i64>,
    ) -> Result<AnnouncementRecord, ApiError> {
        create(Auth(user.clone()), State(state.clone()), Json(request(visibility, class)))
            .await
            .map(|(_, body)| body.0.data)
    }

    #[tokio::test]
    async fn class_audience_needs_valid_class() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);

        for class in [None, Some(0)] {
            let err = publish(&state, &admin, Visibility::Class, class).await.unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn teacher_publishes_only_to_assigned_classes() {
        let (_temp, state) = test_state();
        let teacher = seed_teacher(&state, "T-01", &[10]);

        publish(&state, &teacher, Visibility::All, None).await.unwrap();
        publish(&state, &teacher, Visibility::Student, Some(10)).await.unwrap();
        let err = publish(&state, &teacher, Visibility::Class, Some(11))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn teacher_cannot_retarget_or_delete_foreign_class() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let teacher = seed_teacher(&state, "T-01", &[10]);
        let foreign = publish(&state, &admin, Visibility::Class, Some(11)).await.unwrap();
        let own = publish(&state, &teacher, Visibility::Class, Some(10)).await.unwrap();

        let err = update(
            Auth(teacher.clone()),
            State(state.clone()),
            Path(own.id.clone()),
            Json(UpdateAnnouncementRequest {
                class: Some(11),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = delete(Auth(teacher), State(state), Path(foreign.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn teacher_cannot_rewrite_foreign_class_announcement() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let teacher = seed_teacher(&state, "T-01", &[10]);
        let foreign = publish(&state, &admin, Visibility::Class, Some(11)).await.unwrap();

        let changes = [
            UpdateAnnouncementRequest {
                class: Some(10),
                ..Default::default()
            },
            UpdateAnnouncementRequest {
                title: Some("Changed".into()),
                ..Default::default()
            },
        ];
        for change in changes {
            let err = update(
                Auth(teacher.clone()),
                State(state.clone()),
                Path(foreign.id.clone()),
                Json(change),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status, StatusCode::FORBIDDEN);
        }

        let stored = AnnouncementRepository::new(state.storage())
            .get(&foreign.id)
            .unwrap();
        assert_eq!(stored.title, "Sports day");
        assert_eq!(stored.class.map(|c| c.get()), Some(11));
    }

    #[tokio::test]
    async fn update_rejects_class_zero() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let teacher = seed_teacher(&state, "T-01", &[10]);
        let announcement = publish(&state, &admin, Visibility::Class, Some(10)).await.unwrap();

        for caller in [admin, teacher] {
            let err = update(
                Auth(caller),
                State(state.clone()),
                Path(announcement.id.clone()),
                Json(UpdateAnnouncementRequest {
                    class: Some(0),
                    ..Default::default()
                }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }

        let stored = AnnouncementRepository::new(state.storage())
            .get(&announcement.id)
            .unwrap();
        assert_eq!(stored.class.map(|c| c.get()), Some(10));
    }

    #[tokio::test]
    async fn student_sees_school_wide_and_own_class() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let student = seed_student(&state, "S-10", 10);
        publish(&state, &admin, Visibility::All, None).await.unwrap();
        publish(&state, &admin, Visibility::Class, Some(10)).await.unwrap();
        let other = publish(&state, &admin, Visibility::Class, Some(11)).await.unwrap();
        let staff = publish(&state, &admin, Visibility::Teacher, None).await.unwrap();

        let visible = list(Auth(student.clone()), State(state.clone()))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(visible.len(), 2);

        for hidden in [other.id, staff.id] {
            let err = get(Auth(student.clone()), State(state.clone()), Path(hidden))
                .await
                .unwrap_err();
            assert_eq!(err.status, StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn students_cannot_publish() {
        let (_temp, state) = test_state();
        let student = seed_student(&state, "S-10", 10);

        let err = publish(&state, &student, Visibility::All, None).await.unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
