// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::access::{AccessError, InvalidTarget};
use crate::auth::AuthError;
use crate::storage::{IndexError, StorageError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::not_found(format!("Not found: {what}")),
            StorageError::AlreadyExists(what) => {
                ApiError::conflict(format!("Already exists: {what}"))
            }
            StorageError::Index(IndexError::Taken { kind, key }) => {
                ApiError::conflict(format!("{} already in use: {key}", kind.label()))
            }
            other => {
                tracing::error!(error = %other, "Storage failure");
                ApiError::internal("Internal storage error")
            }
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Denied(reason) => {
                ApiError::forbidden(format!("Access denied: {reason}"))
            }
            AccessError::InvalidTarget(target) => ApiError::bad_request(target.message()),
        }
    }
}

impl From<InvalidTarget> for ApiError {
    fn from(err: InvalidTarget) -> Self {
        ApiError::bad_request(err.message())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if let AuthError::InternalError(detail) = &err {
            tracing::error!(error = %detail, "Authentication failure");
            return ApiError::internal("Internal authentication error");
        }
        ApiError::new(err.status_code(), err.to_string())
    }
}
