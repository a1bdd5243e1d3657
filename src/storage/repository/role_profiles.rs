// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::access::{RoleProfiles, StudentEnrollment, TeacherAssignment};

use super::super::{DocumentStorage, StorageError, UniqueIndex};
use super::{StudentRepository, TeacherRepository};

/// Role profile lookups backed by the students and teachers collections.
/// Every call reads from disk.
pub struct StorageProfiles<'a> {
    storage: &'a DocumentStorage,
    index: &'a UniqueIndex,
}

impl<'a> StorageProfiles<'a> {
    pub fn new(storage: &'a DocumentStorage, index: &'a UniqueIndex) -> Self {
        Self { storage, index }
    }
}

impl RoleProfiles for StorageProfiles<'_> {
    type Error = StorageError;

    fn teacher_assignment(
        &self,
        registration_id: &str,
    ) -> Result<Option<TeacherAssignment>, StorageError> {
        Ok(TeacherRepository::new(self.storage, self.index)
            .find_by_registration(registration_id)?
            .map(|t| t.assignment()))
    }

    fn student_enrollment(
        &self,
        registration_id: &str,
    ) -> Result<Option<StudentEnrollment>, StorageError> {
        Ok(StudentRepository::new(self.storage, self.index)
            .find_by_registration(registration_id)?
            .map(|s| s.enrollment()))
    }
}
