// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Student enrollment records, keyed by user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::access::{ClassId, ScopeTarget, StudentEnrollment};

use super::super::index::name_key;
use super::super::{
    Collection, DocumentStorage, StorageError, StorageResult, UniqueIndex, UniqueKey,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StudentRecord {
    pub user_id: String,
    /// School registration number, unique among students.
    pub registration_id: String,
    #[schema(value_type = u32)]
    pub enrolled_class: ClassId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentRecord {
    pub fn new(user_id: impl Into<String>, registration_id: &str, enrolled_class: ClassId) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            registration_id: name_key(registration_id),
            enrolled_class,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn enrollment(&self) -> StudentEnrollment {
        StudentEnrollment {
            registration_id: self.registration_id.clone(),
            enrolled_class: self.enrolled_class,
        }
    }
}

impl ScopeTarget for StudentRecord {
    fn scope_class(&self) -> Option<ClassId> {
        Some(self.enrolled_class)
    }

    fn scope_registration(&self) -> Option<&str> {
        Some(&self.registration_id)
    }
}

pub struct StudentRepository<'a> {
    storage: &'a DocumentStorage,
    index: &'a UniqueIndex,
}

impl<'a> StudentRepository<'a> {
    pub fn new(storage: &'a DocumentStorage, index: &'a UniqueIndex) -> Self {
        Self { storage, index }
    }

    pub fn get(&self, user_id: &str) -> StorageResult<StudentRecord> {
        self.storage.load(Collection::Students, user_id)
    }

    pub fn find(&self, user_id: &str) -> StorageResult<Option<StudentRecord>> {
        self.storage.find(Collection::Students, user_id)
    }

    pub fn find_by_registration(&self, registration_id: &str) -> StorageResult<Option<StudentRecord>> {
        match self
            .index
            .lookup(UniqueKey::StudentRegistration, &name_key(registration_id))?
        {
            Some(user_id) => self.find(&user_id),
            None => Ok(None),
        }
    }

    pub fn create(&self, student: &StudentRecord) -> StorageResult<()> {
        if self.storage.contains(Collection::Students, &student.user_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Student {}",
                student.user_id
            )));
        }

        let key = name_key(&student.registration_id);
        self.index
            .claim(UniqueKey::StudentRegistration, &key, &student.user_id)?;
        if let Err(e) = self.storage.save(Collection::Students, &student.user_id, student) {
            let _ = self
                .index
                .release(UniqueKey::StudentRegistration, &key, &student.user_id);
            return Err(e);
        }
        Ok(())
    }

    pub fn update(&self, student: &StudentRecord) -> StorageResult<()> {
        let current = self.get(&student.user_id)?;
        let old_key = name_key(&current.registration_id);
        let new_key = name_key(&student.registration_id);
        if old_key != new_key {
            self.index.reassign(
                UniqueKey::StudentRegistration,
                Some(&old_key),
                &new_key,
                &student.user_id,
            )?;
        }
        self.storage
            .save(Collection::Students, &student.user_id, student)
    }

    /// Remove the record if present.
    pub fn delete(&self, user_id: &str) -> StorageResult<Option<StudentRecord>> {
        let Some(student) = self.find(user_id)? else {
            return Ok(None);
        };
        self.storage.remove(Collection::Students, user_id)?;
        self.index.release(
            UniqueKey::StudentRegistration,
            &name_key(&student.registration_id),
            user_id,
        )?;
        Ok(Some(student))
    }

    pub fn list_all(&self) -> StorageResult<Vec<StudentRecord>> {
        self.storage.load_all(Collection::Students)
    }
}
