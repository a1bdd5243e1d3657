// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication endpoints: registration, login, password reset and the
//! caller's own account.

use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::guard::registration_of;
use super::response::{created, message, ok, ApiResult, Created, MessageResponse};
use super::users::{non_empty, password_hash, validate_email, UserDetails};
use crate::{
    access::ClassId,
    audit_log,
    auth::{
        current_account, generate_access_token,
        password::{generate_reset_token, hash_reset_token, verify_password, verify_unknown_account},
        Auth, AuthError, Role,
    },
    error::ApiError,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, PasswordResetRecord,
        PasswordResetRepository, ProfileRecord, ProfileRepository, StoredUser, StudentRecord,
        StudentRepository, UserRepository,
    },
};

const NEUTRAL_RESET_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been issued";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Only `Student` is accepted.
    #[serde(default = "student_role")]
    pub role: Role,
    pub registration_id: Option<String>,
    pub class: Option<i64>,
}

fn student_role() -> Role {
    Role::Student
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserDetails,
    pub profile: Option<ProfileRecord>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn issue_token(state: &AppState, user: &StoredUser) -> Result<String, ApiError> {
    let registration_id = registration_of(state, &user.id, user.role)?;
    generate_access_token(&user.id, user.role, registration_id.as_deref(), &state.jwt).map_err(|e| {
        tracing::error!(error = %e, "Token signing failed");
        ApiError::internal("Failed to issue token")
    })
}

fn auth_response(state: &AppState, user: &StoredUser) -> Result<AuthResponse, ApiError> {
    Ok(AuthResponse {
        token: issue_token(state, user)?,
        user: UserDetails::load(state, user)?,
        profile: ProfileRepository::new(state.storage()).find(&user.id)?,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Self-register a student account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Only students may self-register"),
        (status = 409, description = "Email or registration id already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Created<AuthResponse> {
    if req.role != Role::Student {
        return Err(ApiError::forbidden("Only student accounts can self-register"));
    }

    let name = non_empty(&req.name, "name")?;
    let email = validate_email(&req.email)?;
    let enrollment = match (req.registration_id.as_deref().map(str::trim), req.class) {
        (Some(reg), Some(class)) if !reg.is_empty() => Some((reg.to_string(), ClassId::new(class)?)),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "registration_id and class must be given together",
            ))
        }
    };

    let account = StoredUser::new(name, email, password_hash(&req.password)?, Role::Student);
    let users = UserRepository::new(state.storage(), state.index());
    users.create(&account)?;

    let mut registration_id = None;
    if let Some((reg, class)) = enrollment {
        let record = StudentRecord::new(account.id.as_str(), &reg, class);
        if let Err(e) = StudentRepository::new(state.storage(), state.index()).create(&record) {
            let _ = users.delete(&account.id);
            return Err(e.into());
        }
        registration_id = Some(record.registration_id);
    }
    ProfileRepository::new(state.storage()).save(&ProfileRecord::new(&account.id, registration_id))?;

    tracing::info!(user_id = %account.id, "Student registered");
    AuditRepository::new(state.storage()).record(
        AuditEvent::new(AuditEventType::UserCreated)
            .with_user(&account.id)
            .with_resource("user", &account.id),
    );

    Ok(created(auth_response(&state, &account)?))
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account not active")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let user = UserRepository::new(state.storage(), state.index()).find_by_email(&req.email)?;

    let verified = match &user {
        Some(user) => verify_password(&req.password, &user.password_hash).unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "Stored password hash unreadable");
            false
        }),
        None => verify_unknown_account(&req.password),
    };

    let user = match user {
        Some(user) if verified => user,
        other => {
            let mut event = AuditEvent::new(AuditEventType::LoginFailure).failed("invalid credentials");
            if let Some(user) = other {
                event = event.with_user(&user.id);
            }
            AuditRepository::new(state.storage()).record(event);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    if !user.is_active() {
        AuditRepository::new(state.storage()).record(
            AuditEvent::new(AuditEventType::LoginFailure)
                .with_user(&user.id)
                .failed(format!("account {}", user.status)),
        );
        return Err(AuthError::AccountInactive(user.status.to_string()).into());
    }

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    AuditRepository::new(state.storage())
        .record(AuditEvent::new(AuditEventType::LoginSuccess).with_user(&user.id));

    Ok(ok(auth_response(&state, &user)?))
}

/// Request a password reset link.
///
/// The answer is the same whether or not the email is known.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Request accepted", body = MessageResponse))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(user) = UserRepository::new(state.storage(), state.index()).find_by_email(&req.email)? else {
        return Ok(message(NEUTRAL_RESET_MESSAGE));
    };

    let (token, token_hash) = generate_reset_token().map_err(|_| {
        tracing::error!("System RNG failure while issuing reset token");
        ApiError::internal("Failed to issue reset token")
    })?;
    let ttl = Duration::minutes(state.config.password_reset_ttl_mins);
    PasswordResetRepository::new(state.storage())
        .issue(&PasswordResetRecord::new(&user.id, token_hash, ttl))?;

    // No mail transport; the link is only logged.
    tracing::info!(
        user_id = %user.id,
        reset_url = %state.config.reset_url(&token, &user.email),
        "Password reset issued"
    );
    AuditRepository::new(state.storage())
        .record(AuditEvent::new(AuditEventType::PasswordResetRequested).with_user(&user.id));

    Ok(message(NEUTRAL_RESET_MESSAGE))
}

/// Set a new password with a reset token.
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or weak password")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let new_hash = password_hash(&req.password)?;
    let invalid = || ApiError::bad_request("Invalid or expired reset token");

    let users = UserRepository::new(state.storage(), state.index());
    let mut user = users.find_by_email(&req.email)?.ok_or_else(invalid)?;

    let redeemed = PasswordResetRepository::new(state.storage())
        .redeem(&user.id, &hash_reset_token(req.token.trim()))?;
    if !redeemed {
        return Err(invalid());
    }

    user.password_hash = new_hash;
    user.updated_at = Utc::now();
    users.update(&user)?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    AuditRepository::new(state.storage())
        .record(AuditEvent::new(AuditEventType::PasswordReset).with_user(&user.id));

    Ok(message("Password has been reset"))
}

/// The caller's own account, role data and profile.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserDetails),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> ApiResult<UserDetails> {
    let account = current_account(&state, &user)?;
    Ok(ok(UserDetails::load(&state, &account)?))
}

/// Change the caller's name or email.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "Auth",
    request_body = UpdateAccountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account updated", body = UserDetails),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<UserDetails> {
    let mut account = current_account(&state, &user)?;

    if let Some(name) = &req.name {
        account.name = non_empty(name, "name")?;
    }
    if let Some(email) = &req.email {
        account.email = validate_email(email)?;
    }
    account.updated_at = Utc::now();
    UserRepository::new(state.storage(), state.index()).update(&account)?;

    audit_log!(state.storage(), AuditEventType::UserUpdated, &user, "user", &account.id);

    Ok(ok(UserDetails::load(&state, &account)?))
}

/// Change the caller's password.
#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    tag = "Auth",
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password wrong or new password too weak")
    )
)]
pub async fn change_password(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut account = current_account(&state, &user)?;

    let matches = verify_password(&req.current_password, &account.password_hash)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    if !matches {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    account.password_hash = password_hash(&req.new_password)?;
    account.updated_at = Utc::now();
    UserRepository::new(state.storage(), state.index()).update(&account)?;
    PasswordResetRepository::new(state.storage()).revoke(&account.id)?;

    audit_log!(state.storage(), AuditEventType::PasswordChanged, &user);

    Ok(message("Password changed successfully"))
}

/// Acknowledge a logout. Tokens are stateless; the client discards it.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(Auth(user): Auth, State(state): State<AppState>) -> Json<MessageResponse> {
    audit_log!(state.storage(), AuditEventType::Logout, &user, "token", &user.token_id);
    message("Logged out successfully")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::seed_student;
    use crate::auth::validate_token;
    use crate::state::testing::test_state;
    use crate::storage::AccountStatus;
    use axum::http::StatusCode;

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada".into(),
            email: email.into(),
            password: "secret123".into(),
            role: Role::Student,
            registration_id: Some("S-77".into()),
            class: Some(7),
        }
    }

    async fn login_as(state: &AppState, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        login(
            State(state.clone()),
            Json(LoginRequest {
                email: email.into(),
                password: password.into(),
            }),
        )
        .await
        .map(|r| r.0.data)
    }

    #[tokio::test]
    async fn register_then_login_carries_registration() {
        let (_temp, state) = test_state();
        let (status, body) = register(State(state.clone()), Json(registration("ada@school.test")))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.0.data.user.enrolled_class, Some(ClassId::new(7).unwrap()));

        let session = login_as(&state, "ADA@school.test", "secret123").await.unwrap();
        let claims = validate_token(&session.token, &state.jwt).unwrap();
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.reg.as_deref(), Some("S-77"));
        assert!(session.profile.is_some());
    }

    #[tokio::test]
    async fn register_rejects_privileged_roles() {
        let (_temp, state) = test_state();
        let mut req = registration("boss@school.test");
        req.role = Role::Admin;

        let err = register(State(state), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let (_temp, state) = test_state();
        register(State(state.clone()), Json(registration("ada@school.test")))
            .await
            .unwrap();

        let wrong = login_as(&state, "ada@school.test", "nope-nope").await.unwrap_err();
        let unknown = login_as(&state, "who@school.test", "secret123").await.unwrap_err();
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status, unknown.status);
        assert_eq!(wrong.message, unknown.message);
    }

    #[tokio::test]
    async fn inactive_account_cannot_log_in() {
        let (_temp, state) = test_state();
        register(State(state.clone()), Json(registration("ada@school.test")))
            .await
            .unwrap();
        let users = UserRepository::new(state.storage(), state.index());
        let mut user = users.find_by_email("ada@school.test").unwrap().unwrap();
        user.status = AccountStatus::Suspended;
        users.update(&user).unwrap();

        let err = login_as(&state, "ada@school.test", "secret123").await.unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let (_temp, state) = test_state();
        register(State(state.clone()), Json(registration("ada@school.test")))
            .await
            .unwrap();
        let user = UserRepository::new(state.storage(), state.index())
            .find_by_email("ada@school.test")
            .unwrap()
            .unwrap();

        let (token, hash) = generate_reset_token().unwrap();
        PasswordResetRepository::new(state.storage())
            .issue(&PasswordResetRecord::new(&user.id, hash, Duration::minutes(5)))
            .unwrap();

        let request = || ResetPasswordRequest {
            email: "ada@school.test".into(),
            token: token.clone(),
            password: "brand-new-pw".into(),
        };
        reset_password(State(state.clone()), Json(request())).await.unwrap();
        let again = reset_password(State(state.clone()), Json(request()))
            .await
            .unwrap_err();
        assert_eq!(again.status, StatusCode::BAD_REQUEST);

        assert!(login_as(&state, "ada@school.test", "brand-new-pw").await.is_ok());
    }

    #[tokio::test]
    async fn forgot_password_is_neutral() {
        let (_temp, state) = test_state();
        register(State(state.clone()), Json(registration("ada@school.test")))
            .await
            .unwrap();

        let known = forgot_password(
            State(state.clone()),
            Json(ForgotPasswordRequest {
                email: "ada@school.test".into(),
            }),
        )
        .await
        .unwrap();
        let unknown = forgot_password(
            State(state.clone()),
            Json(ForgotPasswordRequest {
                email: "nobody@school.test".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(known.0.message, unknown.0.message);
    }

    #[tokio::test]
    async fn change_password_checks_current() {
        let (_temp, state) = test_state();
        let user = seed_student(&state, "S-01", 3);

        let err = change_password(
            Auth(user.clone()),
            State(state.clone()),
            Json(ChangePasswordRequest {
                current_password: "not-it".into(),
                new_password: "another-pw".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
