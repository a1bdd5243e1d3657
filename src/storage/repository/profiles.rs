// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Personal profiles (contact details, bio, picture), one per user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{Collection, DocumentStorage, StorageResult};

/// Image shown until the owner uploads one.
pub const DEFAULT_IMAGE_URL: &str = "./Avatar.png";

/// URL prefix under which uploaded pictures are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

fn default_image_url() -> String {
    DEFAULT_IMAGE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ProfileRecord {
    pub user_id: String,
    /// Registration id of the owner's role record, if any.
    pub registration_id: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub bio: String,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: u8,
    #[serde(default = "default_image_url")]
    pub image_url: String,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn new(user_id: impl Into<String>, registration_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            registration_id,
            address: String::new(),
            phone: String::new(),
            bio: String::new(),
            gender: None,
            age: 0,
            image_url: default_image_url(),
            updated_at: Utc::now(),
        }
    }

    /// File name under the uploads directory, when the image is an upload
    /// issued to this profile's owner (`{user_id}-...`).
    pub fn uploaded_image(&self) -> Option<&str> {
        let owner_prefix = format!("{}-", self.user_id);
        self.image_url
            .strip_prefix(UPLOADS_URL_PREFIX)
            .filter(|name| name.starts_with(&owner_prefix) && name.len() > owner_prefix.len())
            .filter(|name| !name.contains(['/', '\\', '\0']))
    }
}

pub struct ProfileRepository<'a> {
    storage: &'a DocumentStorage,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(storage: &'a DocumentStorage) -> Self {
        Self { storage }
    }

    pub fn get(&self, user_id: &str) -> StorageResult<ProfileRecord> {
        self.storage.load(Collection::Profiles, user_id)
    }

    pub fn find(&self, user_id: &str) -> StorageResult<Option<ProfileRecord>> {
        self.storage.find(Collection::Profiles, user_id)
    }

    pub fn find_by_registration(&self, registration_id: &str) -> StorageResult<Option<ProfileRecord>> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|p| p.registration_id.as_deref() == Some(registration_id)))
    }

    /// Create or replace.
    pub fn save(&self, profile: &ProfileRecord) -> StorageResult<()> {
        self.storage
            .save(Collection::Profiles, &profile.user_id, profile)
    }

    pub fn delete(&self, user_id: &str) -> StorageResult<Option<ProfileRecord>> {
        let Some(profile) = self.find(user_id)? else {
            return Ok(None);
        };
        self.storage.remove(Collection::Profiles, user_id)?;
        Ok(Some(profile))
    }

    pub fn list_all(&self) -> StorageResult<Vec<ProfileRecord>> {
        self.storage.load_all(Collection::Profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::temp_store;

    #[test]
    fn defaults_fill_missing_fields() {
        let json = serde_json::json!({
            "user_id": "u1",
            "registration_id": null,
            "gender": null,
            "updated_at": "2026-01-01T00:00:00Z"
        });
        let profile: ProfileRecord = serde_json::from_value(json).unwrap();
        assert_eq!(profile.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(profile.age, 0);
        assert!(profile.bio.is_empty());
    }

    #[test]
    fn uploaded_image_only_for_upload_paths() {
        let mut p = ProfileRecord::new("u1", None);
        assert_eq!(p.uploaded_image(), None);

        p.image_url = "/uploads/u1-abc.png".into();
        assert_eq!(p.uploaded_image(), Some("u1-abc.png"));

        p.image_url = "/uploads/../index.redb".into();
        assert_eq!(p.uploaded_image(), None);

        p.image_url = "/uploads/..".into();
        assert_eq!(p.uploaded_image(), None);

        p.image_url = "/uploads/u2-abc.png".into();
        assert_eq!(p.uploaded_image(), None);

        p.image_url = "/uploads/u1-".into();
        assert_eq!(p.uploaded_image(), None);
    }

    #[test]
    fn save_find_by_registration_delete() {
        let (_temp, storage, _index) = temp_store();
        let repo = ProfileRepository::new(&storage);

        let mut p = ProfileRecord::new("u1", Some("S-001".into()));
        p.gender = Some(Gender::Female);
        repo.save(&p).unwrap();

        let found = repo.find_by_registration("S-001").unwrap().unwrap();
        assert_eq!(found.gender, Some(Gender::Female));

        assert!(repo.delete("u1").unwrap().is_some());
        assert!(repo.find("u1").unwrap().is_none());
    }
}
