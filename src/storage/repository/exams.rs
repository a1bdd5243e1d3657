// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exams are named sittings ("Mid-Term", "Final") that marks refer to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::index::name_key;
use super::super::{Collection, DocumentStorage, StorageResult, UniqueIndex, UniqueKey};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ExamRecord {
    pub id: String,
    /// Unique, stored trimmed.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExamRecord {
    pub fn new(name: &str, description: impl Into<String>, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name_key(name),
            description: description.into(),
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

pub struct ExamRepository<'a> {
    storage: &'a DocumentStorage,
    index: &'a UniqueIndex,
}

impl<'a> ExamRepository<'a> {
    pub fn new(storage: &'a DocumentStorage, index: &'a UniqueIndex) -> Self {
        Self { storage, index }
    }

    pub fn get(&self, id: &str) -> StorageResult<ExamRecord> {
        self.storage.load(Collection::Exams, id)
    }

    pub fn create(&self, exam: &ExamRecord) -> StorageResult<()> {
        let key = name_key(&exam.name);
        self.index.claim(UniqueKey::ExamName, &key, &exam.id)?;
        if let Err(e) = self.storage.save(Collection::Exams, &exam.id, exam) {
            let _ = self.index.release(UniqueKey::ExamName, &key, &exam.id);
            return Err(e);
        }
        Ok(())
    }

    pub fn update(&self, exam: &ExamRecord) -> StorageResult<()> {
        let current = self.get(&exam.id)?;
        let old_key = name_key(&current.name);
        let new_key = name_key(&exam.name);
        if old_key != new_key {
            self.index
                .reassign(UniqueKey::ExamName, Some(&old_key), &new_key, &exam.id)?;
        }
        self.storage.save(Collection::Exams, &exam.id, exam)
    }

    pub fn delete(&self, id: &str) -> StorageResult<ExamRecord> {
        let exam = self.get(id)?;
        self.storage.remove(Collection::Exams, id)?;
        self.index
            .release(UniqueKey::ExamName, &name_key(&exam.name), id)?;
        Ok(exam)
    }

    /// All exams, oldest first.
    pub fn list_all(&self) -> StorageResult<Vec<ExamRecord>> {
        let mut exams: Vec<ExamRecord> = self.storage.load_all(Collection::Exams)?;
        exams.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(exams)
    }
}
