// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Weekly timetables, one document per class under `classes/{class}.json`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::access::ClassId;

use super::super::{Collection, DocumentStorage, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TimetableSlot {
    pub time: String,
    pub subject: String,
    pub teacher: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ClassTimetable {
    #[schema(value_type = u32)]
    pub class: ClassId,
    /// Day name to slots.
    pub timetable: BTreeMap<String, Vec<TimetableSlot>>,
    pub updated_at: DateTime<Utc>,
}

pub struct TimetableRepository<'a> {
    storage: &'a DocumentStorage,
}

impl<'a> TimetableRepository<'a> {
    pub fn new(storage: &'a DocumentStorage) -> Self {
        Self { storage }
    }

    pub fn find(&self, class: ClassId) -> StorageResult<Option<ClassTimetable>> {
        self.storage
            .find(Collection::Classes, &class.to_string())
    }

    /// Replace the class timetable, creating it if needed.
    pub fn upsert(
        &self,
        class: ClassId,
        timetable: BTreeMap<String, Vec<TimetableSlot>>,
    ) -> StorageResult<ClassTimetable> {
        let record = ClassTimetable {
            class,
            timetable,
            updated_at: Utc::now(),
        };
        self.storage
            .save(Collection::Classes, &class.to_string(), &record)?;
        Ok(record)
    }

    /// Every class timetable, by class number.
    pub fn list_all(&self) -> StorageResult<Vec<ClassTimetable>> {
        let mut all: Vec<ClassTimetable> = self.storage.load_all(Collection::Classes)?;
        all.sort_by_key(|t| t.class);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::temp_store;

    fn monday(subject: &str) -> BTreeMap<String, Vec<TimetableSlot>> {
        BTreeMap::from([(
            "Monday".to_string(),
            vec![TimetableSlot {
                time: "09:00".into(),
                subject: subject.into(),
                teacher: "Mr. Smith".into(),
            }],
        )])
    }

    #[test]
    fn upsert_replaces_and_lists_numerically() {
        let (_temp, storage, _index) = temp_store();
        let repo = TimetableRepository::new(&storage);
        let c = |n| ClassId::new(n).unwrap();

        repo.upsert(c(10), monday("Math")).unwrap();
        repo.upsert(c(9), monday("Art")).unwrap();
        repo.upsert(c(10), monday("Physics")).unwrap();

        let all = repo.list_all().unwrap();
        assert_eq!(all.iter().map(|t| t.class.get()).collect::<Vec<_>>(), vec![9, 10]);
        assert_eq!(all[1].timetable["Monday"][0].subject, "Physics");
        assert!(repo.find(c(11)).unwrap().is_none());
    }
}
