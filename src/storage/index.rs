// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unique-key index backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users_by_email`: normalized email → user id
//! - `students_by_reg`: registration id → user id
//! - `teachers_by_reg`: registration id → user id
//! - `marks_by_key`: `reg|subject|exam` → mark id
//! - `exams_by_name`: trimmed exam name → exam id
//!
//! A key is claimed in a single write transaction before the owning document
//! is written, so two concurrent creates cannot both win.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use unicode_normalization::UnicodeNormalization;

// =============================================================================
// Table Definitions
// =============================================================================

const USERS_BY_EMAIL: TableDefinition<&str, &str> = TableDefinition::new("users_by_email");
const STUDENTS_BY_REG: TableDefinition<&str, &str> = TableDefinition::new("students_by_reg");
const TEACHERS_BY_REG: TableDefinition<&str, &str> = TableDefinition::new("teachers_by_reg");
const MARKS_BY_KEY: TableDefinition<&str, &str> = TableDefinition::new("marks_by_key");
const EXAMS_BY_NAME: TableDefinition<&str, &str> = TableDefinition::new("exams_by_name");

/// The unique constraints the index enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueKey {
    UserEmail,
    StudentRegistration,
    TeacherRegistration,
    Mark,
    ExamName,
}

impl UniqueKey {
    pub const ALL: [UniqueKey; 5] = [
        UniqueKey::UserEmail,
        UniqueKey::StudentRegistration,
        UniqueKey::TeacherRegistration,
        UniqueKey::Mark,
        UniqueKey::ExamName,
    ];

    fn table(self) -> TableDefinition<'static, &'static str, &'static str> {
        match self {
            UniqueKey::UserEmail => USERS_BY_EMAIL,
            UniqueKey::StudentRegistration => STUDENTS_BY_REG,
            UniqueKey::TeacherRegistration => TEACHERS_BY_REG,
            UniqueKey::Mark => MARKS_BY_KEY,
            UniqueKey::ExamName => EXAMS_BY_NAME,
        }
    }

    /// Human label used in conflict messages.
    pub fn label(self) -> &'static str {
        match self {
            UniqueKey::UserEmail => "email",
            UniqueKey::StudentRegistration => "student registration id",
            UniqueKey::TeacherRegistration => "teacher registration id",
            UniqueKey::Mark => "mark for this student, subject and exam",
            UniqueKey::ExamName => "exam name",
        }
    }
}

// =============================================================================
// Key Helpers
// =============================================================================

/// Canonical form of an email address: NFKC, trimmed, lowercase.
pub fn email_key(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// Canonical form of an exam name or registration id: NFKC, trimmed.
pub fn name_key(name: &str) -> String {
    name.trim().nfkc().collect()
}

/// Composite key for the one-mark-per-(student, subject, exam) rule.
pub fn mark_key(registration_id: &str, subject: &str, exam: &str) -> String {
    format!(
        "{}|{}|{}",
        name_key(registration_id),
        name_key(subject).to_lowercase(),
        name_key(exam)
    )
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("{} already in use: {key}", .kind.label())]
    Taken { kind: UniqueKey, key: String },
}

pub type IndexResult<T> = Result<T, IndexError>;

// =============================================================================
// UniqueIndex
// =============================================================================

pub struct UniqueIndex {
    db: Database,
}

impl UniqueIndex {
    /// Open (or create) the index at the given path.
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        for kind in UniqueKey::ALL {
            let _ = write_txn.open_table(kind.table())?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Owner of `key`, if claimed.
    pub fn lookup(&self, kind: UniqueKey, key: &str) -> IndexResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(kind.table())?;
        let owner = table.get(key)?.map(|v| v.value().to_string());
        Ok(owner)
    }

    /// Claim `key` for `owner`. Re-claiming one's own key is a no-op.
    pub fn claim(&self, kind: UniqueKey, key: &str, owner: &str) -> IndexResult<()> {
        self.reassign(kind, None, key, owner)
    }

    /// Move `owner` from `old_key` to `new_key` in one transaction.
    ///
    /// Fails with `Taken` if `new_key` belongs to someone else; `old_key` is
    /// then left untouched.
    pub fn reassign(
        &self,
        kind: UniqueKey,
        old_key: Option<&str>,
        new_key: &str,
        owner: &str,
    ) -> IndexResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(kind.table())?;
            let current = table.get(new_key)?.map(|v| v.value().to_string());
            match current {
                Some(existing) if existing != owner => {
                    return Err(IndexError::Taken {
                        kind,
                        key: new_key.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    table.insert(new_key, owner)?;
                }
            }
            if let Some(old_key) = old_key.filter(|k| *k != new_key) {
                let owned = table
                    .get(old_key)?
                    .is_some_and(|v| v.value() == owner);
                if owned {
                    table.remove(old_key)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Release `key` if it is held by `owner`.
    pub fn release(&self, kind: UniqueKey, key: &str, owner: &str) -> IndexResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(kind.table())?;
            let owned = table.get(key)?.is_some_and(|v| v.value() == owner);
            if owned {
                table.remove(key)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn len(&self, kind: UniqueKey) -> IndexResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(kind.table())?;
        let len = table.len()?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_index() -> (UniqueIndex, TempDir) {
        let dir = TempDir::new().unwrap();
        let index = UniqueIndex::open(&dir.path().join("index.redb")).unwrap();
        (index, dir)
    }

    #[test]
    fn claim_and_lookup() {
        let (index, _dir) = temp_index();
        index.claim(UniqueKey::UserEmail, "a@school.test", "u1").unwrap();
        assert_eq!(
            index.lookup(UniqueKey::UserEmail, "a@school.test").unwrap(),
            Some("u1".to_string())
        );
        assert_eq!(index.lookup(UniqueKey::StudentRegistration, "a@school.test").unwrap(), None);
    }

    #[test]
    fn second_owner_is_rejected() {
        let (index, _dir) = temp_index();
        index.claim(UniqueKey::ExamName, "Mid-Term", "e1").unwrap();
        index.claim(UniqueKey::ExamName, "Mid-Term", "e1").unwrap();
        let err = index.claim(UniqueKey::ExamName, "Mid-Term", "e2").unwrap_err();
        assert!(matches!(err, IndexError::Taken { kind: UniqueKey::ExamName, .. }));
        assert_eq!(err.to_string(), "exam name already in use: Mid-Term");
    }

    #[test]
    fn reassign_moves_key_atomically() {
        let (index, _dir) = temp_index();
        index.claim(UniqueKey::UserEmail, "old@x", "u1").unwrap();
        index.claim(UniqueKey::UserEmail, "taken@x", "u2").unwrap();

        assert!(index
            .reassign(UniqueKey::UserEmail, Some("old@x"), "taken@x", "u1")
            .is_err());
        assert_eq!(index.lookup(UniqueKey::UserEmail, "old@x").unwrap().as_deref(), Some("u1"));

        index
            .reassign(UniqueKey::UserEmail, Some("old@x"), "new@x", "u1")
            .unwrap();
        assert_eq!(index.lookup(UniqueKey::UserEmail, "old@x").unwrap(), None);
        assert_eq!(index.lookup(UniqueKey::UserEmail, "new@x").unwrap().as_deref(), Some("u1"));
    }

    #[test]
    fn release_only_frees_own_keys() {
        let (index, _dir) = temp_index();
        index.claim(UniqueKey::Mark, "k", "m1").unwrap();
        index.release(UniqueKey::Mark, "k", "m2").unwrap();
        assert_eq!(index.len(UniqueKey::Mark).unwrap(), 1);
        index.release(UniqueKey::Mark, "k", "m1").unwrap();
        assert_eq!(index.len(UniqueKey::Mark).unwrap(), 0);
    }

    #[test]
    fn keys_are_normalized() {
        assert_eq!(email_key("  Ada@School.TEST "), "ada@school.test");
        assert_eq!(name_key(" Mid-Term "), "Mid-Term");
        assert_eq!(mark_key("S-1", "Math ", "Final"), "S-1|math|Final");
    }

    #[test]
    fn claims_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.redb");
        {
            let index = UniqueIndex::open(&path).unwrap();
            index.claim(UniqueKey::TeacherRegistration, "T-1", "u9").unwrap();
        }
        let index = UniqueIndex::open(&path).unwrap();
        assert_eq!(
            index.lookup(UniqueKey::TeacherRegistration, "T-1").unwrap().as_deref(),
            Some("u9")
        );
    }
}
