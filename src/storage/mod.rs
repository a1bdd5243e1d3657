// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Records are JSON documents on the local filesystem; uniqueness rules live
//! in a small embedded redb index next to them.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   users/{user_id}.json
//!   students/{user_id}.json
//!   teachers/{user_id}.json
//!   profiles/{user_id}.json
//!   marks/{mark_id}.json
//!   announcements/{announcement_id}.json
//!   exams/{exam_id}.json
//!   classes/{class}.json          # timetables
//!   password_resets/{user_id}.json
//!   uploads/                      # profile images, served at /uploads
//!   audit/{date}/events.jsonl     # daily audit logs
//!   index.redb                    # unique keys
//! ```

pub mod audit;
pub mod documents;
pub mod index;
pub mod paths;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditFilter, AuditRepository};
pub use documents::{DocumentStorage, StorageError, StorageResult};
pub use index::{IndexError, UniqueIndex, UniqueKey};
pub use paths::{Collection, StoragePaths};
pub use repository::{
    AccountStatus, AnnouncementRecord, AnnouncementRepository, ClassTimetable, ExamRecord,
    ExamRepository, Gender, MarkFilter, MarkRecord, MarkRepository, PasswordResetRecord,
    PasswordResetRepository, ProfileRecord, ProfileRepository, StorageProfiles, StoredUser,
    StudentRecord, StudentRepository, TeacherRecord, TeacherRepository, TimetableRepository,
    TimetableSlot, UserRepository, UserResponse, DEFAULT_IMAGE_URL, MAX_SCORE, UPLOADS_URL_PREFIX,
};
