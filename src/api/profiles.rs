// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Personal profile endpoints and picture upload.
//!
//! Anyone signed in may read a profile. Only the owner or an admin may change
//! it. Uploaded pictures live in `DATA_DIR/uploads` and are served under
//! `/uploads/`.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::guard::{registration_of, Caller};
use super::response::{ok, ApiResult};
use crate::{
    access::{Action, Resource},
    audit_log,
    auth::{Auth, Role},
    error::ApiError,
    state::AppState,
    storage::{
        AuditEventType, Gender, ProfileRecord, ProfileRepository, StoredUser, StudentRepository,
        TeacherRepository, UserRepository, UPLOADS_URL_PREFIX,
    },
};

/// Accepted picture extensions.
const IMAGE_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

/// A profile with the owner's display name.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileView {
    pub name: String,
    pub role: Role,
    #[serde(flatten)]
    pub profile: ProfileRecord,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub address: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<u8>,
    pub image_url: Option<String>,
}

/// Profile of `user`, or a blank one if none was saved yet.
fn view(state: &AppState, user: &StoredUser) -> Result<ProfileView, ApiError> {
    let profile = match ProfileRepository::new(state.storage()).find(&user.id)? {
        Some(profile) => profile,
        None => ProfileRecord::new(&user.id, registration_of(state, &user.id, user.role)?),
    };
    Ok(ProfileView {
        name: user.name.clone(),
        role: user.role,
        profile,
    })
}

fn owner(state: &AppState, user_id: &str) -> Result<StoredUser, ApiError> {
    UserRepository::new(state.storage(), state.index())
        .find(user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

fn read(state: &AppState, caller: &Caller, user_id: &str) -> ApiResult<ProfileView> {
    caller.authorize(
        state,
        Action::Read,
        &Resource::Profile {
            owner_id: user_id.to_string(),
        },
    )?;
    let user = owner(state, user_id)?;
    Ok(ok(view(state, &user)?))
}

/// Delete a previously uploaded picture. Missing files are ignored.
pub(crate) fn remove_upload(state: &AppState, file_name: &str) {
    let path = state.storage().paths().upload(file_name);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(file = %path.display(), error = %e, "Failed to remove old upload");
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/profile/{user_id}",
    tag = "Profiles",
    params(("user_id" = String, Path, description = "User ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileView),
        (status = 404, description = "User not found")
    )
)]
pub async fn get(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ProfileView> {
    let caller = Caller::load(&state, &user)?;
    read(&state, &caller, &user_id)
}

#[utoipa::path(
    get,
    path = "/api/profile/student/{reg}",
    tag = "Profiles",
    params(("reg" = String, Path, description = "Student registration id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileView),
        (status = 404, description = "Student not found")
    )
)]
pub async fn get_student(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(reg): Path<String>,
) -> ApiResult<ProfileView> {
    let caller = Caller::load(&state, &user)?;
    let student = StudentRepository::new(state.storage(), state.index())
        .find_by_registration(&reg)?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;
    read(&state, &caller, &student.user_id)
}

#[utoipa::path(
    get,
    path = "/api/profile/teacher/{reg}",
    tag = "Profiles",
    params(("reg" = String, Path, description = "Teacher registration id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileView),
        (status = 404, description = "Teacher not found")
    )
)]
pub async fn get_teacher(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(reg): Path<String>,
) -> ApiResult<ProfileView> {
    let caller = Caller::load(&state, &user)?;
    let teacher = TeacherRepository::new(state.storage(), state.index())
        .find_by_registration(&reg)?
        .ok_or_else(|| ApiError::not_found("Teacher not found"))?;
    read(&state, &caller, &teacher.user_id)
}

/// Update contact details and bio. Owner or admin.
#[utoipa::path(
    put,
    path = "/api/profile/{user_id}",
    tag = "Profiles",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UpdateProfileRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile updated", body = ProfileView),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<ProfileView> {
    let caller = Caller::load(&state, &user)?;
    caller.authorize(
        &state,
        Action::Update,
        &Resource::Profile {
            owner_id: user_id.clone(),
        },
    )?;
    let target = owner(&state, &user_id)?;
    let mut profile = view(&state, &target)?.profile;

    if let Some(address) = req.address {
        profile.address = address.trim().to_string();
    }
    if let Some(phone) = req.phone {
        profile.phone = phone.trim().to_string();
    }
    if let Some(bio) = req.bio {
        profile.bio = bio.trim().to_string();
    }
    if let Some(gender) = req.gender {
        profile.gender = Some(gender);
    }
    if let Some(age) = req.age {
        profile.age = age;
    }
    let mut replaced_upload = None;
    if let Some(image_url) = req.image_url {
        let image_url = image_url.trim().to_string();
        if image_url != profile.image_url {
            if image_url.starts_with(UPLOADS_URL_PREFIX) {
                return Err(ApiError::bad_request(
                    "Uploaded pictures can only be set through the image upload",
                ));
            }
            replaced_upload = profile.uploaded_image().map(str::to_string);
            profile.image_url = image_url;
        }
    }
    profile.updated_at = Utc::now();
    ProfileRepository::new(state.storage()).save(&profile)?;
    if let Some(old) = replaced_upload {
        remove_upload(&state, &old);
    }

    audit_log!(state.storage(), AuditEventType::ProfileUpdated, &user, "profile", &user_id);

    Ok(ok(ProfileView {
        name: target.name,
        role: target.role,
        profile,
    }))
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}

/// Upload a new profile picture (multipart field `image`). Owner or admin.
#[utoipa::path(
    post,
    path = "/api/profile/{user_id}/image",
    tag = "Profiles",
    params(("user_id" = String, Path, description = "User ID")),
    request_body(content_type = "multipart/form-data", description = "Field `image`: jpeg, jpg, png, gif or webp"),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Picture stored", body = ProfileView),
        (status = 400, description = "Missing field or unsupported file type"),
        (status = 403, description = "Not the owner"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_image(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<ProfileView> {
    let caller = Caller::load(&state, &user)?;
    caller.authorize(
        &state,
        Action::Update,
        &Resource::Profile {
            owner_id: user_id.clone(),
        },
    )?;
    let target = owner(&state, &user_id)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let extension = field
            .file_name()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                ApiError::bad_request("Only jpeg, jpg, png, gif and webp images are allowed")
            })?;
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((extension, data));
        break;
    }
    let (extension, data) = upload.ok_or_else(|| ApiError::bad_request("image field is required"))?;

    let limit = state.config.max_upload_bytes;
    if data.len() > limit {
        return Err(ApiError::payload_too_large(format!(
            "Image exceeds the {limit} byte limit"
        )));
    }
    if data.is_empty() {
        return Err(ApiError::bad_request("image is empty"));
    }

    let file_name = format!("{}-{}.{extension}", target.id, uuid::Uuid::new_v4());
    state
        .storage()
        .write_raw(state.storage().paths().upload(&file_name), &data)?;

    let mut profile = view(&state, &target)?.profile;
    let previous = profile.uploaded_image().map(str::to_string);
    profile.image_url = format!("/uploads/{file_name}");
    profile.updated_at = Utc::now();
    if let Err(e) = ProfileRepository::new(state.storage()).save(&profile) {
        remove_upload(&state, &file_name);
        return Err(e.into());
    }
    if let Some(previous) = previous {
        remove_upload(&state, &previous);
    }

    tracing::info!(user_id = %target.id, bytes = data.len(), "Profile picture uploaded");
    audit_log!(state.storage(), AuditEventType::ProfileUpdated, &user, "profile", &target.id);

    Ok(ok(ProfileView {
        name: target.name,
        role: target.role,
        profile,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{seed_admin, seed_student, seed_teacher};
    use crate::auth::AuthenticatedUser;
    use crate::state::testing::test_state;
    use crate::storage::DEFAULT_IMAGE_URL;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header::CONTENT_TYPE, Request, StatusCode},
    };

    const BOUNDARY: &str = "school-portal-boundary";

    async fn multipart(state: &AppState, field: &str, file_name: &str, data: &[u8]) -> Multipart {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, state).await.unwrap()
    }

    async fn upload(
        state: &AppState,
        caller: &AuthenticatedUser,
        owner: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<ProfileView, ApiError> {
        let form = multipart(state, "image", file_name, data).await;
        upload_image(Auth(caller.clone()), State(state.clone()), Path(owner.to_string()), form)
            .await
            .map(|r| r.0.data)
    }

    #[tokio::test]
    async fn missing_profile_reads_as_default() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let student = seed_student(&state, "S-01", 4);
        ProfileRepository::new(state.storage())
            .delete(&student.user_id)
            .unwrap();

        let view = get(Auth(admin), State(state), Path(student.user_id))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(view.profile.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(view.profile.registration_id.as_deref(), Some("S-01"));
    }

    #[tokio::test]
    async fn lookup_by_registration() {
        let (_temp, state) = test_state();
        let student = seed_student(&state, "S-01", 4);
        let teacher = seed_teacher(&state, "T-01", &[4]);

        let view = get_teacher(Auth(student.clone()), State(state.clone()), Path("T-01".into()))
            .await
            .unwrap()
            .0
            .data;
        assert_eq!(view.profile.user_id, teacher.user_id);

        let err = get_student(Auth(student), State(state), Path("S-99".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_owner_or_admin_updates() {
        let (_temp, state) = test_state();
        let admin = seed_admin(&state);
        let me = seed_student(&state, "S-01", 4);
        let other = seed_student(&state, "S-02", 4);
        let teacher = seed_teacher(&state, "T-01", &[4]);

        let bio = || {
            Json(UpdateProfileRequest {
                bio: Some("Hello".into()),
                ..Default::default()
            })
        };
        update(Auth(me.clone()), State(state.clone()), Path(me.user_id.clone()), bio())
            .await
            .unwrap();
        update(Auth(admin), State(state.clone()), Path(other.user_id.clone()), bio())
            .await
            .unwrap();

        for intruder in [me, teacher] {
            let err = update(Auth(intruder), State(state.clone()), Path(other.user_id.clone()), bio())
                .await
                .unwrap_err();
            assert_eq!(err.status, StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn upload_replaces_previous_picture() {
        let (_temp, state) = test_state();
        let me = seed_student(&state, "S-01", 4);

        let first = upload(&state, &me, &me.user_id, "me.PNG", b"first").await.unwrap();
        let first_name = first.profile.uploaded_image().unwrap().to_string();
        assert!(first_name.ends_with(".png"));
        let first_path = state.storage().paths().upload(&first_name);
        assert!(first_path.exists());

        let second = upload(&state, &me, &me.user_id, "me.webp", b"second").await.unwrap();
        let second_path = state
            .storage()
            .paths()
            .upload(second.profile.uploaded_image().unwrap());
        assert!(second_path.exists());
        assert!(!first_path.exists());
    }

    #[tokio::test]
    async fn cannot_claim_another_users_upload() {
        let (_temp, state) = test_state();
        let owner = seed_student(&state, "S-01", 4);
        let intruder = seed_student(&state, "S-02", 4);

        let uploaded = upload(&state, &owner, &owner.user_id, "me.png", b"mine").await.unwrap();
        let owner_file = state
            .storage()
            .paths()
            .upload(uploaded.profile.uploaded_image().unwrap());

        let set_image = |url: &str| {
            Json(UpdateProfileRequest {
                image_url: Some(url.to_string()),
                ..Default::default()
            })
        };
        let err = update(
            Auth(intruder.clone()),
            State(state.clone()),
            Path(intruder.user_id.clone()),
            set_image(&uploaded.profile.image_url),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        update(
            Auth(intruder.clone()),
            State(state.clone()),
            Path(intruder.user_id.clone()),
            set_image("https://cdn.example.com/cat.png"),
        )
        .await
        .unwrap();
        assert!(owner_file.exists());
    }

    #[tokio::test]
    async fn switching_to_external_url_removes_own_upload() {
        let (_temp, state) = test_state();
        let me = seed_student(&state, "S-01", 4);

        let uploaded = upload(&state, &me, &me.user_id, "me.png", b"mine").await.unwrap();
        let path = state
            .storage()
            .paths()
            .upload(uploaded.profile.uploaded_image().unwrap());

        let view = update(
            Auth(me.clone()),
            State(state.clone()),
            Path(me.user_id.clone()),
            Json(UpdateProfileRequest {
                image_url: Some("https://cdn.example.com/me.png".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .0
        .data;
        assert_eq!(view.profile.image_url, "https://cdn.example.com/me.png");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn upload_rejects_bad_type_and_size() {
        let (_temp, state) = test_state();
        let me = seed_student(&state, "S-01", 4);

        let err = upload(&state, &me, &me.user_id, "notes.txt", b"text").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let big = vec![0u8; state.config.max_upload_bytes + 1];
        let err = upload(&state, &me, &me.user_id, "big.png", &big).await.unwrap_err();
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn cannot_upload_for_someone_else() {
        let (_temp, state) = test_state();
        let me = seed_student(&state, "S-01", 4);
        let other = seed_student(&state, "S-02", 4);

        let err = upload(&state, &me, &other.user_id, "x.png", b"x").await.unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
