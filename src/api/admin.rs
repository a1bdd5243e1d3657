// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only operational endpoints: collection counts and audit log queries.

use axum::extract::{Query, State};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::response::{ok, ApiResult};
use crate::{
    audit_log,
    auth::AdminOnly,
    error::ApiError,
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditFilter, AuditRepository, Collection},
};

/// Longest date range one audit query may span.
const MAX_AUDIT_RANGE_DAYS: i64 = 366;
const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionCount {
    pub collection: String,
    pub documents: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DbInfoResponse {
    pub data_dir: String,
    pub collections: Vec<CollectionCount>,
    pub total_documents: usize,
    pub timestamp: String,
}

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQueryParams {
    /// Start date (YYYY-MM-DD). Defaults to today.
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD). Defaults to today.
    pub end_date: Option<String>,
    pub user_id: Option<String>,
    /// Snake-case event name, e.g. `permission_denied`.
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// Maximum number of results (default 100, max 1000).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    /// Matches before limit/offset.
    pub total: usize,
    pub has_more: bool,
}

fn parse_date(value: Option<&str>, default: NaiveDate, field: &str) -> Result<NaiveDate, ApiError> {
    match value {
        None => Ok(default),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request(format!("Invalid {field} format. Use YYYY-MM-DD."))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Document counts per collection.
#[utoipa::path(
    get,
    path = "/api/db/info",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Collection counts", body = DbInfoResponse),
        (status = 403, description = "Admin only")
    )
)]
pub async fn db_info(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> ApiResult<DbInfoResponse> {
    let storage = state.storage();
    let mut collections = Vec::with_capacity(Collection::ALL.len());
    for collection in Collection::ALL {
        collections.push(CollectionCount {
            collection: collection.dir_name().to_string(),
            documents: storage.count(collection)?,
        });
    }
    let total_documents = collections.iter().map(|c| c.documents).sum();

    audit_log!(storage, AuditEventType::AdminAccess, &admin, "db", "info");

    Ok(ok(DbInfoResponse {
        data_dir: storage.paths().root().display().to_string(),
        collections,
        total_documents,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Query audit logs by date range, user, event or resource.
#[utoipa::path(
    get,
    path = "/api/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn query_audit_logs(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<AuditLogResponse> {
    let today = Utc::now().date_naive();
    let start = parse_date(params.start_date.as_deref(), today, "start_date")?;
    let end = parse_date(params.end_date.as_deref(), today, "end_date")?;
    if end < start {
        return Err(ApiError::bad_request("end_date is before start_date"));
    }
    if (end - start).num_days() > MAX_AUDIT_RANGE_DAYS {
        return Err(ApiError::bad_request(format!(
            "Date range is limited to {MAX_AUDIT_RANGE_DAYS} days"
        )));
    }

    let filter = AuditFilter {
        user_id: params.user_id,
        event_type: params.event_type,
        resource_type: params.resource_type,
        resource_id: params.resource_id,
    };
    let events = AuditRepository::new(state.storage()).query(start, end, &filter)?;

    let total = events.len();
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let has_more = offset.saturating_add(limit) < total;
    let events = events.into_iter().skip(offset).take(limit).collect();

    audit_log!(state.storage(), AuditEventType::AdminAccess, &admin, "audit", "query");

    Ok(ok(AuditLogResponse {
        events,
        total,
        has_more,
    }))
}
