// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending password resets. At most one per user; the token itself is never
//! stored, only its SHA-256 hash.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::super::{Collection, DocumentStorage, StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordResetRecord {
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetRecord {
    pub fn new(user_id: impl Into<String>, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            token_hash,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Constant-time comparison against a candidate hash.
    pub fn matches(&self, token_hash: &str) -> bool {
        self.token_hash.as_bytes().ct_eq(token_hash.as_bytes()).into()
    }
}

pub struct PasswordResetRepository<'a> {
    storage: &'a DocumentStorage,
}

impl<'a> PasswordResetRepository<'a> {
    pub fn new(storage: &'a DocumentStorage) -> Self {
        Self { storage }
    }

    /// Store a reset, replacing any earlier one for the same user.
    pub fn issue(&self, record: &PasswordResetRecord) -> StorageResult<()> {
        self.storage
            .save(Collection::PasswordResets, &record.user_id, record)
    }

    /// Consume the pending reset if `token_hash` matches and it has not
    /// expired. Expired records are removed either way.
    ///
    /// The record is removed before the answer is given, so of two
    /// concurrent redeems of one token only the one that removes it wins.
    pub fn redeem(&self, user_id: &str, token_hash: &str) -> StorageResult<bool> {
        let Some(record) = self
            .storage
            .find::<PasswordResetRecord>(Collection::PasswordResets, user_id)?
        else {
            return Ok(false);
        };

        if record.is_expired(Utc::now()) {
            self.take(user_id)?;
            return Ok(false);
        }
        if !record.matches(token_hash) {
            return Ok(false);
        }

        self.take(user_id)
    }

    /// Remove the pending reset; `false` if someone else already did.
    fn take(&self, user_id: &str) -> StorageResult<bool> {
        match self.storage.remove(Collection::PasswordResets, user_id) {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn revoke(&self, user_id: &str) -> StorageResult<()> {
        if self.storage.contains(Collection::PasswordResets, user_id) {
            self.storage.remove(Collection::PasswordResets, user_id)?;
        }
        Ok(())
    }
}
