// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response envelopes.
//!
//! Successful responses are `{ "success": true, "data": ... }`, or
//! `{ "success": true, "message": ... }` for plain acknowledgements.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub type ApiResult<T> = Result<Json<DataResponse<T>>, ApiError>;
pub type Created<T> = Result<(StatusCode, Json<DataResponse<T>>), ApiError>;

pub fn ok<T: Serialize>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<DataResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: text.into(),
    })
}
