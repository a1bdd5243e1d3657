// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON document storage on the local filesystem.
//!
//! Every record is one pretty-printed JSON file. Writes go to a temporary
//! file first and are renamed into place, so readers never observe a
//! partially written document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use super::index::IndexError;
use super::{Collection, StoragePaths};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Document storage manager.
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    paths: StoragePaths,
    initialized: bool,
}

impl DocumentStorage {
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Create every collection directory. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for collection in Collection::ALL {
            fs::create_dir_all(self.paths.collection_dir(collection))?;
        }
        fs::create_dir_all(self.paths.uploads_dir())?;
        fs::create_dir_all(self.paths.audit_dir())?;

        self.initialized = true;
        Ok(())
    }

    /// Write-read-delete check of the data directory.
    pub fn health_check(&self) -> StorageResult<()> {
        self.ensure_initialized()?;

        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::SerializationError(
                "Health check data mismatch".to_string(),
            ));
        }

        Ok(())
    }

    fn ensure_initialized(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    // ========== Generic JSON Operations ==========

    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        self.ensure_initialized()?;

        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let value = serde_json::from_reader(reader)?;
        Ok(value)
    }

    /// Write a JSON file (atomic write via rename).
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        self.ensure_initialized()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Unique temp name so concurrent writers of one document never share it.
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    pub fn delete(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.ensure_initialized()?;
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// List file stems in a directory with the given extension.
    pub fn list_files(&self, dir: impl AsRef<Path>, extension: &str) -> StorageResult<Vec<String>> {
        self.ensure_initialized()?;

        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != extension) {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    // ========== Raw File Operations ==========

    pub fn write_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        self.ensure_initialized()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        self.ensure_initialized()?;

        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Append one line to a file, creating it if needed.
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> StorageResult<()> {
        self.ensure_initialized()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf)?;
        Ok(())
    }

    // ========== Collection Operations ==========

    /// Load one document; a missing file becomes `NotFound("{collection} {id}")`.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> StorageResult<T> {
        if !is_document_id(id) {
            return Err(StorageError::NotFound(format!("{} {id}", collection.dir_name())));
        }
        self.read_json(self.paths.document(collection, id))
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    StorageError::NotFound(format!("{} {id}", collection.dir_name()))
                }
                other => other,
            })
    }

    /// Load a document if present.
    pub fn find<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> StorageResult<Option<T>> {
        match self.load(collection, id) {
            Ok(value) => Ok(Some(value)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save<T: Serialize>(&self, collection: Collection, id: &str, value: &T) -> StorageResult<()> {
        if !is_document_id(id) {
            return Err(StorageError::SerializationError(format!("invalid document id: {id}")));
        }
        self.write_json(self.paths.document(collection, id), value)
    }

    pub fn contains(&self, collection: Collection, id: &str) -> bool {
        is_document_id(id) && self.exists(self.paths.document(collection, id))
    }

    pub fn remove(&self, collection: Collection, id: &str) -> StorageResult<()> {
        if !is_document_id(id) {
            return Err(StorageError::NotFound(format!("{} {id}", collection.dir_name())));
        }
        self.delete(self.paths.document(collection, id))
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    StorageError::NotFound(format!("{} {id}", collection.dir_name()))
                }
                other => other,
            })
    }

    /// Every document of a collection. Documents deleted mid-scan are skipped.
    pub fn load_all<T: DeserializeOwned>(&self, collection: Collection) -> StorageResult<Vec<T>> {
        let ids = self.list_files(self.paths.collection_dir(collection), "json")?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.find(collection, &id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn count(&self, collection: Collection) -> StorageResult<usize> {
        Ok(self
            .list_files(self.paths.collection_dir(collection), "json")?
            .len())
    }
}

/// Ids come from request paths; they must name a file inside the collection.
fn is_document_id(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\', '\0'])
}
