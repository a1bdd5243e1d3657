// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the document store.
//!
//! Each repository provides CRUD operations for one collection. Repositories
//! holding unique fields also take the [`UniqueIndex`](super::UniqueIndex)
//! and claim keys before writing.

pub mod announcements;
pub mod exams;
pub mod marks;
pub mod password_resets;
pub mod profiles;
pub mod role_profiles;
pub mod students;
pub mod teachers;
pub mod timetables;
pub mod users;

pub use announcements::{AnnouncementRecord, AnnouncementRepository};
pub use exams::{ExamRecord, ExamRepository};
pub use marks::{MarkFilter, MarkRecord, MarkRepository, MAX_SCORE};
pub use password_resets::{PasswordResetRecord, PasswordResetRepository};
pub use profiles::{
    Gender, ProfileRecord, ProfileRepository, DEFAULT_IMAGE_URL, UPLOADS_URL_PREFIX,
};
pub use role_profiles::StorageProfiles;
pub use students::{StudentRecord, StudentRepository};
pub use teachers::{TeacherRecord, TeacherRepository};
pub use timetables::{ClassTimetable, TimetableRepository, TimetableSlot};
pub use users::{AccountStatus, StoredUser, UserRepository, UserResponse};
