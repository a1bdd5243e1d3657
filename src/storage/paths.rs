// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the storage layout.

use std::path::{Path, PathBuf};

/// Default data directory when `DATA_DIR` is not set.
pub const DATA_ROOT: &str = "./data";

/// Document collections, one directory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Students,
    Teachers,
    Profiles,
    Marks,
    Announcements,
    Exams,
    Classes,
    PasswordResets,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Users,
        Collection::Students,
        Collection::Teachers,
        Collection::Profiles,
        Collection::Marks,
        Collection::Announcements,
        Collection::Exams,
        Collection::Classes,
        Collection::PasswordResets,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Students => "students",
            Collection::Teachers => "teachers",
            Collection::Profiles => "profiles",
            Collection::Marks => "marks",
            Collection::Announcements => "announcements",
            Collection::Exams => "exams",
            Collection::Classes => "classes",
            Collection::PasswordResets => "password_resets",
        }
    }
}

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Documents ==========

    pub fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.dir_name())
    }

    /// Path to one JSON document.
    pub fn document(&self, collection: Collection, id: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{id}.json"))
    }

    // ========== Unique Index ==========

    pub fn index_db(&self) -> PathBuf {
        self.root.join("index.redb")
    }

    // ========== Uploads ==========

    /// Directory served under `/uploads`.
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn upload(&self, file_name: &str) -> PathBuf {
        self.uploads_dir().join(file_name)
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("./data"));
    }

    #[test]
    fn document_paths_are_per_collection() {
        let paths = StoragePaths::new("/tmp/school");
        assert_eq!(
            paths.document(Collection::Marks, "m-1"),
            PathBuf::from("/tmp/school/marks/m-1.json")
        );
        assert_eq!(
            paths.document(Collection::PasswordResets, "u-1"),
            PathBuf::from("/tmp/school/password_resets/u-1.json")
        );
    }

    #[test]
    fn auxiliary_paths_are_correct() {
        let paths = StoragePaths::new("/srv");
        assert_eq!(paths.index_db(), PathBuf::from("/srv/index.redb"));
        assert_eq!(paths.upload("a.png"), PathBuf::from("/srv/uploads/a.png"));
        assert_eq!(
            paths.audit_events_file("2026-01-02"),
            PathBuf::from("/srv/audit/2026-01-02/events.jsonl")
        );
    }
}
