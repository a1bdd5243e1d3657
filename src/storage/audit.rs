// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Account changes, grade changes, announcements, authentication events and
//! permission denials are appended to a daily JSONL file.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DocumentStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    UserCreated,
    UserUpdated,
    UserDeleted,
    ProfileUpdated,

    // Grade events
    MarkRecorded,
    MarkUpdated,
    MarkDeleted,

    // Announcement events
    AnnouncementPublished,
    AnnouncementUpdated,
    AnnouncementDeleted,

    // Academic calendar events
    ExamCreated,
    ExamUpdated,
    ExamDeleted,
    TimetableUpdated,

    // Auth events
    LoginSuccess,
    LoginFailure,
    Logout,
    PasswordChanged,
    PasswordResetRequested,
    PasswordReset,
    PermissionDenied,

    // Admin events
    AdminAccess,
}

impl AuditEventType {
    /// Wire name, as used in the `event_type` query filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::UserCreated => "user_created",
            AuditEventType::UserUpdated => "user_updated",
            AuditEventType::UserDeleted => "user_deleted",
            AuditEventType::ProfileUpdated => "profile_updated",
            AuditEventType::MarkRecorded => "mark_recorded",
            AuditEventType::MarkUpdated => "mark_updated",
            AuditEventType::MarkDeleted => "mark_deleted",
            AuditEventType::AnnouncementPublished => "announcement_published",
            AuditEventType::AnnouncementUpdated => "announcement_updated",
            AuditEventType::AnnouncementDeleted => "announcement_deleted",
            AuditEventType::ExamCreated => "exam_created",
            AuditEventType::ExamUpdated => "exam_updated",
            AuditEventType::ExamDeleted => "exam_deleted",
            AuditEventType::TimetableUpdated => "timetable_updated",
            AuditEventType::LoginSuccess => "login_success",
            AuditEventType::LoginFailure => "login_failure",
            AuditEventType::Logout => "logout",
            AuditEventType::PasswordChanged => "password_changed",
            AuditEventType::PasswordResetRequested => "password_reset_requested",
            AuditEventType::PasswordReset => "password_reset",
            AuditEventType::PermissionDenied => "permission_denied",
            AuditEventType::AdminAccess => "admin_access",
        }
    }
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (user id, mark id, ...).
    pub resource_id: Option<String>,
    /// Resource type (user, mark, announcement, ...).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Filters for [`AuditRepository::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
}

impl AuditFilter {
    fn matches(&self, event: &AuditEvent) -> bool {
        let eq = |want: &Option<String>, have: Option<&str>| {
            want.as_deref().is_none_or(|w| have == Some(w))
        };
        eq(&self.user_id, event.user_id.as_deref())
            && eq(&self.event_type, Some(event.event_type.as_str()))
            && eq(&self.resource_type, event.resource_type.as_deref())
            && eq(&self.resource_id, event.resource_id.as_deref())
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a DocumentStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a DocumentStorage) -> Self {
        Self { storage }
    }

    /// Append an event to its day's JSONL file.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let event_json = serde_json::to_string(event).map_err(|e| {
            StorageError::SerializationError(format!("Failed to serialize audit event: {e}"))
        })?;
        self.storage.append_line(&path, &event_json)
    }

    /// Log an event, reporting failures to tracing only.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                error = %e,
                event_type = event.event_type.as_str(),
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;

        let content_str = String::from_utf8(content).map_err(|e| {
            StorageError::SerializationError(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        let mut events = Vec::new();
        for line in content_str.lines().filter(|l| !l.trim().is_empty()) {
            let event: AuditEvent = serde_json::from_str(line).map_err(|e| {
                StorageError::SerializationError(format!("Failed to deserialize audit event: {e}"))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// Read events for an inclusive date range. Days without a log are skipped.
    pub fn read_events_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StorageResult<Vec<AuditEvent>> {
        let mut all_events = Vec::new();
        let mut current = start;

        while current <= end {
            let date_str = current.format("%Y-%m-%d").to_string();
            match self.read_events(&date_str) {
                Ok(events) => all_events.extend(events),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::SerializationError("Date overflow".to_string()))?;
        }

        Ok(all_events)
    }

    /// Filtered events in a date range.
    pub fn query(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filter: &AuditFilter,
    ) -> StorageResult<Vec<AuditEvent>> {
        let mut events = self.read_events_range(start, end)?;
        events.retain(|e| filter.matches(e));
        Ok(events)
    }
}

/// Helper macro for logging audit events.
///
/// `$user` is anything with a `user_id` field. Failures are logged, never
/// returned.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $user:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        repo.record($crate::storage::AuditEvent::new($event_type).with_user(&$user.user_id));
    }};
    ($storage:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        repo.record(
            $crate::storage::AuditEvent::new($event_type)
                .with_user(&$user.user_id)
                .with_resource($resource_type, $resource_id),
        );
    }};
}
