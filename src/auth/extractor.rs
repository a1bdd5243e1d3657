// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require a valid access token:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{jwt::validate_token, AuthError, AuthenticatedUser, Role};
use crate::state::AppState;
use crate::storage::{StoredUser, UserRepository};

/// Extractor for authenticated users.
///
/// Verifies the `Authorization: Bearer <jwt>` header against the configured
/// HS256 secret. It does not touch storage; handlers that act on the caller's
/// role load the account themselves.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = validate_token(token.trim(), &state.jwt)?;
        Ok(Auth(AuthenticatedUser::from_claims(claims)))
    }
}

/// Extractor that requires an active admin account.
///
/// The role is checked against the stored account, not the token, so a
/// demoted or deactivated admin loses access immediately.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(mut user) = Auth::from_request_parts(parts, state).await?;

        let account = current_account(state, &user)?;
        if account.role != Role::Admin {
            return Err(AuthError::InsufficientPermissions);
        }
        user.role = account.role;

        Ok(AdminOnly(user))
    }
}

/// Load the caller's account and require it to be active.
pub fn current_account(state: &AppState, user: &AuthenticatedUser) -> Result<StoredUser, AuthError> {
    let account = UserRepository::new(state.storage(), state.index())
        .find(&user.user_id)
        .map_err(|e| AuthError::InternalError(e.to_string()))?
        .ok_or(AuthError::UnknownUser)?;

    if !account.is_active() {
        return Err(AuthError::AccountInactive(account.status.to_string()));
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::state::testing::test_state;
    use crate::storage::AccountStatus;
    use axum::http::Request;

    fn parts_with(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn store_user(state: &AppState, role: Role) -> StoredUser {
        let user = StoredUser::new("Test", format!("{}@school.test", role.as_str()), "x".into(), role);
        UserRepository::new(state.storage(), state.index())
            .create(&user)
            .unwrap();
        user
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (_temp, state) = test_state();
        let result = Auth::from_request_parts(&mut parts_with(None), &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer() {
        let (_temp, state) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic abc")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_signed_token() {
        let (_temp, state) = test_state();
        let token = generate_access_token("user_123", Role::Teacher, Some("T-01"), &state.jwt).unwrap();

        let Auth(user) = Auth::from_request_parts(&mut parts_with(Some(&token)), &state)
            .await
            .unwrap();
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.role, Role::Teacher);
        assert_eq!(user.registration_id.as_deref(), Some("T-01"));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_foreign_signature() {
        let (_temp, state) = test_state();
        let other = crate::auth::JwtConfig::new("another-secret", 1);
        let token = generate_access_token("user_123", Role::Admin, None, &other).unwrap();

        let result = Auth::from_request_parts(&mut parts_with(Some(&token)), &state).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn admin_only_uses_stored_role() {
        let (_temp, state) = test_state();
        let teacher = store_user(&state, Role::Teacher);
        // Token claims admin, account says teacher.
        let token = generate_access_token(&teacher.id, Role::Admin, None, &state.jwt).unwrap();

        let result = AdminOnly::from_request_parts(&mut parts_with(Some(&token)), &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_active_admin() {
        let (_temp, state) = test_state();
        let admin = store_user(&state, Role::Admin);
        let token = generate_access_token(&admin.id, Role::Admin, None, &state.jwt).unwrap();

        let AdminOnly(user) = AdminOnly::from_request_parts(&mut parts_with(Some(&token)), &state)
            .await
            .unwrap();
        assert_eq!(user.user_id, admin.id);
    }

    #[test]
    fn current_account_rejects_inactive_and_unknown() {
        let (_temp, state) = test_state();
        let mut admin = store_user(&state, Role::Admin);
        admin.status = AccountStatus::Suspended;
        UserRepository::new(state.storage(), state.index())
            .update(&admin)
            .unwrap();

        let caller = AuthenticatedUser {
            user_id: admin.id.clone(),
            role: Role::Admin,
            registration_id: None,
            token_id: String::new(),
            expires_at: 0,
        };
        assert!(matches!(
            current_account(&state, &caller),
            Err(AuthError::AccountInactive(_))
        ));

        let ghost = AuthenticatedUser {
            user_id: "ghost".into(),
            ..caller
        };
        assert!(matches!(current_account(&state, &ghost), Err(AuthError::UnknownUser)));
    }
}
