// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Role at issue time.
    pub role: Role,
    /// Registration id of the student or teacher record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg: Option<String>,
    /// Expiration (UTC Unix timestamp).
    pub exp: i64,
    /// Issued at (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token id, recorded in the audit log on logout.
    pub jti: String,
}

/// Authenticated user information extracted from a verified token.
///
/// Handlers re-read the user record before acting, so `role` here is only
/// what the token was issued with.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: String,

    pub role: Role,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,

    /// Token id (`jti`).
    #[serde(skip)]
    pub token_id: String,

    /// Token expiration (Unix timestamp).
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            registration_id: claims.reg,
            token_id: claims.jti,
            expires_at: claims.exp,
        }
    }

    /// Check if the user has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> Claims {
        Claims {
            sub: "user_123".to_string(),
            role: Role::Teacher,
            reg: Some("T-01".to_string()),
            exp: 1700003600,
            iat: 1700000000,
            jti: "jti-1".to_string(),
        }
    }

    #[test]
    fn from_claims_copies_identity() {
        let user = AuthenticatedUser::from_claims(sample_claims());
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.role, Role::Teacher);
        assert_eq!(user.registration_id.as_deref(), Some("T-01"));
        assert_eq!(user.token_id, "jti-1");
    }

    #[test]
    fn has_role_checks_privilege() {
        let user = AuthenticatedUser::from_claims(sample_claims());
        assert!(user.has_role(Role::Student));
        assert!(user.has_role(Role::Teacher));
        assert!(!user.has_role(Role::Admin));
        assert!(!user.is_admin());
    }

    #[test]
    fn missing_registration_deserializes_as_none() {
        let json = r#"{"sub":"u","role":"Admin","exp":1,"iat":0,"jti":"x"}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.reg, None);
        assert_eq!(claims.role, Role::Admin);
    }
}
