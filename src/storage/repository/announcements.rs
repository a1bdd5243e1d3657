// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::access::{Audience, ClassId, InvalidTarget, Scope, ScopeTarget, Visibility};

use super::super::{Collection, DocumentStorage, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AnnouncementRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    /// Set iff the visibility is Class or Student.
    #[schema(value_type = Option<u32>)]
    pub class: Option<ClassId>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl AnnouncementRecord {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        audience: Audience,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            visibility: audience.visibility(),
            class: audience.class(),
            created_by: created_by.into(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn audience(&self) -> Result<Audience, InvalidTarget> {
        Audience::stored(self.visibility, self.class)
    }

    pub fn set_audience(&mut self, audience: Audience) {
        self.visibility = audience.visibility();
        self.class = audience.class();
    }
}

impl ScopeTarget for AnnouncementRecord {
    fn scope_class(&self) -> Option<ClassId> {
        self.class
    }

    fn scope_visibility(&self) -> Option<Visibility> {
        Some(self.visibility)
    }
}

pub struct AnnouncementRepository<'a> {
    storage: &'a DocumentStorage,
}

impl<'a> AnnouncementRepository<'a> {
    pub fn new(storage: &'a DocumentStorage) -> Self {
        Self { storage }
    }

    pub fn get(&self, id: &str) -> StorageResult<AnnouncementRecord> {
        self.storage.load(Collection::Announcements, id)
    }

    pub fn save(&self, announcement: &AnnouncementRecord) -> StorageResult<()> {
        self.storage
            .save(Collection::Announcements, &announcement.id, announcement)
    }

    pub fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.remove(Collection::Announcements, id)
    }

    /// Announcements inside `scope`, newest first.
    pub fn list(&self, scope: &Scope) -> StorageResult<Vec<AnnouncementRecord>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let all: Vec<AnnouncementRecord> = self.storage.load_all(Collection::Announcements)?;
        let mut visible = scope.retain(all);
        visible.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(visible)
    }
}
