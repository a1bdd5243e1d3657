// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Teacher assignment records, keyed by user id.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::access::{ClassId, ScopeTarget, TeacherAssignment};

use super::super::index::name_key;
use super::super::{
    Collection, DocumentStorage, StorageError, StorageResult, UniqueIndex, UniqueKey,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TeacherRecord {
    pub user_id: String,
    pub registration_id: String,
    pub subject: String,
    /// Classes this teacher may act on. Changed by admins only.
    #[schema(value_type = Vec<u32>)]
    pub assigned_classes: BTreeSet<ClassId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeacherRecord {
    pub fn new(
        user_id: impl Into<String>,
        registration_id: &str,
        subject: impl Into<String>,
        assigned_classes: BTreeSet<ClassId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            registration_id: name_key(registration_id),
            subject: subject.into(),
            assigned_classes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn assignment(&self) -> TeacherAssignment {
        TeacherAssignment {
            registration_id: self.registration_id.clone(),
            subject: self.subject.clone(),
            assigned_classes: self.assigned_classes.clone(),
        }
    }
}

impl ScopeTarget for TeacherRecord {
    fn scope_class(&self) -> Option<ClassId> {
        None
    }

    fn scope_registration(&self) -> Option<&str> {
        Some(&self.registration_id)
    }
}

pub struct TeacherRepository<'a> {
    storage: &'a DocumentStorage,
    index: &'a UniqueIndex,
}

impl<'a> TeacherRepository<'a> {
    pub fn new(storage: &'a DocumentStorage, index: &'a UniqueIndex) -> Self {
        Self { storage, index }
    }

    pub fn get(&self, user_id: &str) -> StorageResult<TeacherRecord> {
        self.storage.load(Collection::Teachers, user_id)
    }

    pub fn find(&self, user_id: &str) -> StorageResult<Option<TeacherRecord>> {
        self.storage.find(Collection::Teachers, user_id)
    }

    pub fn find_by_registration(&self, registration_id: &str) -> StorageResult<Option<TeacherRecord>> {
        match self
            .index
            .lookup(UniqueKey::TeacherRegistration, &name_key(registration_id))?
        {
            Some(user_id) => self.find(&user_id),
            None => Ok(None),
        }
    }

    pub fn create(&self, teacher: &TeacherRecord) -> StorageResult<()> {
        if self.storage.contains(Collection::Teachers, &teacher.user_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Teacher {}",
                teacher.user_id
            )));
        }

        let key = name_key(&teacher.registration_id);
        self.index
            .claim(UniqueKey::TeacherRegistration, &key, &teacher.user_id)?;
        if let Err(e) = self.storage.save(Collection::Teachers, &teacher.user_id, teacher) {
            let _ = self
                .index
                .release(UniqueKey::TeacherRegistration, &key, &teacher.user_id);
            return Err(e);
        }
        Ok(())
    }

    pub fn update(&self, teacher: &TeacherRecord) -> StorageResult<()> {
        let current = self.get(&teacher.user_id)?;
        let old_key = name_key(&current.registration_id);
        let new_key = name_key(&teacher.registration_id);
        if old_key != new_key {
            self.index.reassign(
                UniqueKey::TeacherRegistration,
                Some(&old_key),
                &new_key,
                &teacher.user_id,
            )?;
        }
        self.storage
            .save(Collection::Teachers, &teacher.user_id, teacher)
    }

    /// Remove the record if present.
    pub fn delete(&self, user_id: &str) -> StorageResult<Option<TeacherRecord>> {
        let Some(teacher) = self.find(user_id)? else {
            return Ok(None);
        };
        self.storage.remove(Collection::Teachers, user_id)?;
        self.index.release(
            UniqueKey::TeacherRegistration,
            &name_key(&teacher.registration_id),
            user_id,
        )?;
        Ok(Some(teacher))
    }

    pub fn list_all(&self) -> StorageResult<Vec<TeacherRecord>> {
        self.storage.load_all(Collection::Teachers)
    }
}
