// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    access::Visibility,
    auth::Role,
    config::AppConfig,
    state::AppState,
    storage::{
        AccountStatus, AnnouncementRecord, AuditEvent, AuditEventType, ClassTimetable, ExamRecord,
        Gender, MarkRecord, ProfileRecord, TimetableSlot, UserResponse,
    },
};

pub mod admin;
pub mod announcements;
pub mod auth;
pub mod exams;
pub mod guard;
pub mod health;
pub mod marks;
pub mod profiles;
pub mod response;
pub mod timetable;
pub mod users;

/// Multipart framing on top of the image itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + UPLOAD_OVERHEAD_BYTES;
    let uploads_dir = state.storage().paths().uploads_dir();
    let request_id_header = HeaderName::from_static("x-request-id");

    let api = Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route(
            "/api/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/api/auth/change-password", put(auth::change_password))
        .route("/api/auth/logout", post(auth::logout))
        // Users
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{user_id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Marks
        .route("/api/marks", get(marks::list).post(marks::create))
        .route("/api/marks/student/{reg}", get(marks::list_for_student))
        .route(
            "/api/marks/{mark_id}",
            put(marks::update).delete(marks::delete),
        )
        // Announcements
        .route(
            "/api/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route(
            "/api/announcements/{announcement_id}",
            get(announcements::get)
                .put(announcements::update)
                .delete(announcements::delete),
        )
        // Exams
        .route("/api/exams", get(exams::list).post(exams::create))
        .route(
            "/api/exams/{exam_id}",
            get(exams::get).put(exams::update).delete(exams::delete),
        )
        // Timetables
        .route("/api/timetable", get(timetable::list))
        .route(
            "/api/timetable/{class}",
            get(timetable::get).put(timetable::upsert),
        )
        // Profiles
        .route(
            "/api/profile/student/{reg}",
            get(profiles::get_student),
        )
        .route(
            "/api/profile/teacher/{reg}",
            get(profiles::get_teacher),
        )
        .route(
            "/api/profile/{user_id}",
            get(profiles::get).put(profiles::update),
        )
        .route(
            "/api/profile/{user_id}/image",
            post(profiles::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Operations
        .route("/api/health", get(health::health))
        .route("/api/db/info", get(admin::db_info))
        .route("/api/admin/audit", get(admin::query_audit_logs))
        .with_state(state.clone());

    Router::new()
        .merge(api)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors_layer(&state.config))
}

/// CORS for the configured origins; permissive when none are configured.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        auth::get_profile,
        auth::update_profile,
        auth::change_password,
        auth::logout,
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        marks::list,
        marks::list_for_student,
        marks::create,
        marks::update,
        marks::delete,
        announcements::list,
        announcements::get,
        announcements::create,
        announcements::update,
        announcements::delete,
        exams::list,
        exams::get,
        exams::create,
        exams::update,
        exams::delete,
        timetable::list,
        timetable::get,
        timetable::upsert,
        profiles::get,
        profiles::get_student,
        profiles::get_teacher,
        profiles::update,
        profiles::upload_image,
        health::health,
        admin::db_info,
        admin::query_audit_logs
    ),
    components(
        schemas(
            Role,
            AccountStatus,
            Visibility,
            Gender,
            UserResponse,
            users::UserDetails,
            users::CreateUserRequest,
            users::UpdateUserRequest,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::ForgotPasswordRequest,
            auth::ResetPasswordRequest,
            auth::UpdateAccountRequest,
            auth::ChangePasswordRequest,
            MarkRecord,
            marks::CreateMarkRequest,
            marks::UpdateMarkRequest,
            AnnouncementRecord,
            announcements::CreateAnnouncementRequest,
            announcements::UpdateAnnouncementRequest,
            ExamRecord,
            exams::CreateExamRequest,
            exams::UpdateExamRequest,
            ClassTimetable,
            TimetableSlot,
            timetable::UpdateTimetableRequest,
            ProfileRecord,
            profiles::ProfileView,
            profiles::UpdateProfileRequest,
            response::MessageResponse,
            health::HealthResponse,
            health::HealthChecks,
            admin::DbInfoResponse,
            admin::CollectionCount,
            admin::AuditLogResponse,
            AuditEvent,
            AuditEventType
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Login, registration and password reset"),
        (name = "Users", description = "Accounts with their student or teacher records"),
        (name = "Marks", description = "Exam marks"),
        (name = "Announcements", description = "Announcements by audience"),
        (name = "Exams", description = "Exam sittings"),
        (name = "Timetable", description = "Weekly class timetables"),
        (name = "Profiles", description = "Personal profiles and pictures"),
        (name = "Health", description = "Service health"),
        (name = "Admin", description = "Operational endpoints")
    )
)]
struct ApiDoc;

/// Fixtures shared by handler tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;

    use crate::{
        access::ClassId,
        auth::{password::hash_password, AuthenticatedUser, Role},
        state::AppState,
        storage::{
            ProfileRecord, ProfileRepository, StoredUser, StudentRecord, StudentRepository,
            TeacherRecord, TeacherRepository, UserRepository,
        },
    };

    pub const TEST_PASSWORD: &str = "password123";

    fn account(state: &AppState, email: &str, role: Role, registration_id: Option<&str>) -> AuthenticatedUser {
        let hash = hash_password(TEST_PASSWORD).unwrap();
        let user = StoredUser::new(email.to_string(), email, hash, role);
        UserRepository::new(state.storage(), state.index())
            .create(&user)
            .unwrap();
        ProfileRepository::new(state.storage())
            .save(&ProfileRecord::new(&user.id, registration_id.map(str::to_string)))
            .unwrap();

        AuthenticatedUser {
            user_id: user.id,
            role,
            registration_id: registration_id.map(str::to_string),
            token_id: uuid::Uuid::new_v4().to_string(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        }
    }

    pub fn seed_admin(state: &AppState) -> AuthenticatedUser {
        let email = format!("admin-{}@school.test", uuid::Uuid::new_v4());
        account(state, &email, Role::Admin, None)
    }

    pub fn seed_teacher(state: &AppState, registration_id: &str, classes: &[i64]) -> AuthenticatedUser {
        let email = format!("{}@school.test", registration_id.to_lowercase());
        let user = account(state, &email, Role::Teacher, Some(registration_id));
        let classes: BTreeSet<ClassId> = classes.iter().map(|c| ClassId::new(*c).unwrap()).collect();
        TeacherRepository::new(state.storage(), state.index())
            .create(&TeacherRecord::new(user.user_id.as_str(), registration_id, "Math", classes))
            .unwrap();
        user
    }

    pub fn seed_student(state: &AppState, registration_id: &str, class: i64) -> AuthenticatedUser {
        let email = format!("{}@school.test", registration_id.to_lowercase());
        let user = account(state, &email, Role::Student, Some(registration_id));
        StudentRepository::new(state.storage(), state.index())
            .create(&StudentRecord::new(
                user.user_id.as_str(),
                registration_id,
                ClassId::new(class).unwrap(),
            ))
            .unwrap();
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn call(app: Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_carries_request_id() {
        let (_temp, state) = test_state();
        let response = router(state)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-request-id").is_some());
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let (_temp, state) = test_state();
        let (status, body) = call(router(state), "GET", "/api/users", None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn register_login_and_read_own_account() {
        let (_temp, state) = test_state();
        let app = router(state);

        let (status, _) = call(
            app.clone(),
            "POST",
            "/api/auth/register",
            Some(serde_json::json!({
                "name": "Ada",
                "email": "ada@school.test",
                "password": "secret123",
                "registration_id": "S-1",
                "class": 5
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/auth/login",
            Some(serde_json::json!({"email": "ada@school.test", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let token = body["data"]["token"].as_str().unwrap().to_string();
        assert!(body["data"]["user"].get("password_hash").is_none());

        let response = app
            .oneshot(
                Request::get("/api/auth/profile")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let me: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(me["data"]["registration_id"], "S-1");
        assert_eq!(me["data"]["enrolled_class"], 5);
    }

    #[test]
    fn openapi_lists_security_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
