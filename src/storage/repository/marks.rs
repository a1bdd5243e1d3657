// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mark records.
//!
//! A student has at most one mark per (subject, exam); the pair is claimed in
//! the `marks_by_key` index before the document is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::access::{ClassId, Scope, ScopeTarget};

use super::super::index::mark_key;
use super::super::{
    Collection, DocumentStorage, StorageError, StorageResult, UniqueIndex, UniqueKey,
};

pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MarkRecord {
    pub id: String,
    pub registration_id: String,
    /// Class the student was enrolled in when the mark was recorded.
    #[schema(value_type = u32)]
    pub class: ClassId,
    pub subject: String,
    pub exam: String,
    pub score: u8,
    #[serde(default)]
    pub remarks: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl MarkRecord {
    pub fn new(
        registration_id: impl Into<String>,
        class: ClassId,
        subject: &str,
        exam: &str,
        score: u8,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            registration_id: registration_id.into(),
            class,
            subject: subject.trim().to_string(),
            exam: exam.trim().to_string(),
            score,
            remarks: String::new(),
            created_by: created_by.into(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn key(&self) -> String {
        mark_key(&self.registration_id, &self.subject, &self.exam)
    }
}

impl ScopeTarget for MarkRecord {
    fn scope_class(&self) -> Option<ClassId> {
        Some(self.class)
    }

    fn scope_registration(&self) -> Option<&str> {
        Some(&self.registration_id)
    }

    fn scope_exam(&self) -> Option<&str> {
        Some(&self.exam)
    }
}

/// Query filters; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct MarkFilter {
    pub exam: Option<String>,
    pub class: Option<ClassId>,
    pub registration_id: Option<String>,
    pub subject: Option<String>,
}

impl MarkFilter {
    fn matches(&self, mark: &MarkRecord) -> bool {
        self.exam.as_deref().is_none_or(|e| mark.exam == e)
            && self.class.is_none_or(|c| mark.class == c)
            && self
                .registration_id
                .as_deref()
                .is_none_or(|r| mark.registration_id == r)
            && self
                .subject
                .as_deref()
                .is_none_or(|s| mark.subject.eq_ignore_ascii_case(s))
    }
}

pub struct MarkRepository<'a> {
    storage: &'a DocumentStorage,
    index: &'a UniqueIndex,
}

impl<'a> MarkRepository<'a> {
    pub fn new(storage: &'a DocumentStorage, index: &'a UniqueIndex) -> Self {
        Self { storage, index }
    }

    pub fn get(&self, id: &str) -> StorageResult<MarkRecord> {
        self.storage.load(Collection::Marks, id)
    }

    pub fn find(&self, id: &str) -> StorageResult<Option<MarkRecord>> {
        self.storage.find(Collection::Marks, id)
    }

    pub fn create(&self, mark: &MarkRecord) -> StorageResult<()> {
        if mark.score > MAX_SCORE {
            return Err(StorageError::SerializationError(format!(
                "score {} out of range",
                mark.score
            )));
        }

        let key = mark.key();
        self.index.claim(UniqueKey::Mark, &key, &mark.id)?;
        if let Err(e) = self.storage.save(Collection::Marks, &mark.id, mark) {
            let _ = self.index.release(UniqueKey::Mark, &key, &mark.id);
            return Err(e);
        }
        Ok(())
    }

    /// Persist score and remarks. The (student, subject, exam) key is fixed.
    pub fn update(&self, mark: &MarkRecord) -> StorageResult<()> {
        let current = self.get(&mark.id)?;
        if current.key() != mark.key() {
            self.index
                .reassign(UniqueKey::Mark, Some(&current.key()), &mark.key(), &mark.id)?;
        }
        self.storage.save(Collection::Marks, &mark.id, mark)
    }

    pub fn delete(&self, id: &str) -> StorageResult<MarkRecord> {
        let mark = self.get(id)?;
        self.storage.remove(Collection::Marks, id)?;
        self.index.release(UniqueKey::Mark, &mark.key(), id)?;
        Ok(mark)
    }

    /// Marks matching `filter` inside `scope`, newest first.
    pub fn list(&self, filter: &MarkFilter, scope: &Scope) -> StorageResult<Vec<MarkRecord>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let mut marks: Vec<MarkRecord> = self.storage.load_all(Collection::Marks)?;
        marks.retain(|m| filter.matches(m));
        let mut marks = scope.retain(marks);
        marks.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(marks)
    }
}
