// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User account repository.
//!
//! Each account is stored under `users/{user_id}.json`. Email addresses are
//! unique (case-insensitive) through the `users_by_email` index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

use super::super::index::email_key;
use super::super::{
    Collection, DocumentStorage, StorageError, StorageResult, UniqueIndex, UniqueKey,
};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "Active"),
            AccountStatus::Inactive => write!(f, "Inactive"),
            AccountStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

/// User account as persisted. Never serialized into API responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: String,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into().trim().to_string(),
            password_hash,
            role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredUser> for UserResponse {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct UserRepository<'a> {
    storage: &'a DocumentStorage,
    index: &'a UniqueIndex,
}

impl<'a> UserRepository<'a> {
    pub fn new(storage: &'a DocumentStorage, index: &'a UniqueIndex) -> Self {
        Self { storage, index }
    }

    pub fn exists(&self, user_id: &str) -> bool {
        self.storage.contains(Collection::Users, user_id)
    }

    pub fn get(&self, user_id: &str) -> StorageResult<StoredUser> {
        self.storage.load(Collection::Users, user_id)
    }

    pub fn find(&self, user_id: &str) -> StorageResult<Option<StoredUser>> {
        self.storage.find(Collection::Users, user_id)
    }

    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<StoredUser>> {
        match self.index.lookup(UniqueKey::UserEmail, &email_key(email))? {
            Some(user_id) => self.find(&user_id),
            None => Ok(None),
        }
    }

    /// Create an account, claiming its email first.
    pub fn create(&self, user: &StoredUser) -> StorageResult<()> {
        if self.exists(&user.id) {
            return Err(StorageError::AlreadyExists(format!("User {}", user.id)));
        }

        let key = email_key(&user.email);
        self.index.claim(UniqueKey::UserEmail, &key, &user.id)?;
        if let Err(e) = self.storage.save(Collection::Users, &user.id, user) {
            let _ = self.index.release(UniqueKey::UserEmail, &key, &user.id);
            return Err(e);
        }
        Ok(())
    }

    /// Persist changes; a changed email is re-claimed atomically.
    pub fn update(&self, user: &StoredUser) -> StorageResult<()> {
        let current = self.get(&user.id)?;
        let old_key = email_key(&current.email);
        let new_key = email_key(&user.email);

        if old_key != new_key {
            self.index
                .reassign(UniqueKey::UserEmail, Some(&old_key), &new_key, &user.id)?;
        }
        self.storage.save(Collection::Users, &user.id, user)
    }

    pub fn delete(&self, user_id: &str) -> StorageResult<StoredUser> {
        let user = self.get(user_id)?;
        self.storage.remove(Collection::Users, user_id)?;
        self.index
            .release(UniqueKey::UserEmail, &email_key(&user.email), user_id)?;
        Ok(user)
    }

    pub fn list_all(&self) -> StorageResult<Vec<StoredUser>> {
        self.storage.load_all(Collection::Users)
    }

    pub fn list_by_role(&self, role: Role) -> StorageResult<Vec<StoredUser>> {
        let mut users = self.list_all()?;
        users.retain(|u| u.role == role);
        Ok(users)
    }

    pub fn count(&self) -> StorageResult<usize> {
        self.storage.count(Collection::Users)
    }
}
