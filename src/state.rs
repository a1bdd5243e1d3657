// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::JwtConfig;
use crate::config::AppConfig;
use crate::storage::{DocumentStorage, StoragePaths, StorageResult, UniqueIndex};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    storage: Arc<DocumentStorage>,
    index: Arc<UniqueIndex>,
    pub jwt: Arc<JwtConfig>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(storage: DocumentStorage, index: UniqueIndex, config: AppConfig) -> Self {
        let jwt = JwtConfig::new(config.jwt_secret.clone(), config.jwt_expiry_hours);
        Self {
            storage: Arc::new(storage),
            index: Arc::new(index),
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        }
    }

    /// Create the data directories and open the unique index.
    pub fn open(config: AppConfig) -> StorageResult<Self> {
        let paths = StoragePaths::new(&config.data_dir);
        let mut storage = DocumentStorage::new(paths.clone());
        storage.initialize()?;
        let index = UniqueIndex::open(&paths.index_db())?;
        Ok(Self::new(storage, index, config))
    }

    pub fn storage(&self) -> &DocumentStorage {
        &self.storage
    }

    pub fn index(&self) -> &UniqueIndex {
        &self.index
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tempfile::TempDir;

    use super::AppState;
    use crate::config::AppConfig;

    /// State rooted in a fresh temp dir.
    pub fn test_state() -> (TempDir, AppState) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_string_lossy().to_string();
        let config = AppConfig::from_lookup(|name| match name {
            "JWT_SECRET" => Some("test-secret".to_string()),
            "DATA_DIR" => Some(root.clone()),
            "MAX_UPLOAD_BYTES" => Some("1024".to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::open(config).unwrap();
        (temp, state)
    }

    #[test]
    fn open_creates_layout() {
        let (temp, state) = test_state();
        assert!(state.storage().is_initialized());
        assert!(temp.path().join("users").is_dir());
        assert!(temp.path().join("index.redb").exists());
    }
}
