// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plain filesystem operations for serialized records.
//!
//! Every operation opens, fully reads or writes, and closes its file. No
//! handles are kept across calls.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::StoragePaths;
use crate::error::{StoreError, StoreResult};

/// Filesystem access rooted at a repository working tree.
#[derive(Debug, Clone)]
pub struct FileStorage {
    paths: StoragePaths,
}

impl FileStorage {
    /// Create a new FileStorage instance.
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Read a whole file as UTF-8 text.
    pub fn read_text(&self, path: impl AsRef<Path>) -> StoreResult<String> {
        let path = path.as_ref();
        fs::read_to_string(path).map_err(|e| StoreError::storage(path, e))
    }

    /// Write text to a file (atomic write via rename).
    ///
    /// Parent directories are created when missing.
    pub fn write_text(&self, path: impl AsRef<Path>, content: &str) -> StoreResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::storage(parent, e))?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        let written = File::create(&temp_path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            writer.write_all(content.as_bytes())?;
            writer.flush()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::storage(&temp_path, e));
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StoreError::storage(path, e)
        })
    }

    /// Check if a regular file exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Delete a file. Returns `false` if it did not exist.
    pub fn delete(&self, path: impl AsRef<Path>) -> StoreResult<bool> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::storage(path, e)),
        }
    }

    /// List all files in a directory with the given extension.
    ///
    /// A missing directory yields an empty list.
    pub fn list_files(&self, dir: impl AsRef<Path>, extension: &str) -> StoreResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::storage(dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::storage(dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn test_storage() -> FileStorage {
        let test_dir = env::temp_dir().join(format!("test-file-store-{}", uuid::Uuid::new_v4()));
        FileStorage::new(StoragePaths::new(&test_dir))
    }

    fn cleanup_storage(storage: &FileStorage) {
        let _ = fs::remove_dir_all(storage.paths().root());
    }

    #[test]
    fn write_and_read_text() {
        let storage = test_storage();
        let path = storage.paths().record("Note", "a");

        storage.write_text(&path, "id: a\n").unwrap();
        assert_eq!(storage.read_text(&path).unwrap(), "id: a\n");
        assert!(!path.with_extension("tmp").exists());

        cleanup_storage(&storage);
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let storage = test_storage();
        let path = storage.paths().record("Note", "blocked");
        fs::create_dir_all(path.join("inner")).unwrap();

        assert!(storage.write_text(&path, "id: blocked\n").is_err());
        assert!(!path.with_extension("tmp").exists());
        assert!(path.is_dir());

        cleanup_storage(&storage);
    }

    #[test]
    fn list_files_filters_by_extension() {
        let storage = test_storage();
        let dir = storage.paths().repository_dir("Note");
        fs::create_dir_all(&dir).unwrap();
        for name in ["a.yaml", "b.yaml", "c.tmp", "d.txt"] {
            fs::write(dir.join(name), "x").unwrap();
        }
        fs::create_dir(dir.join("sub.yaml")).unwrap();

        let mut names: Vec<String> = storage
            .list_files(&dir, "yaml")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.yaml", "b.yaml"]);

        cleanup_storage(&storage);
    }

    #[test]
    fn list_missing_directory_is_empty() {
        let storage = test_storage();
        let files = storage
            .list_files(storage.paths().repository_dir("Never"), "yaml")
            .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn delete_reports_whether_file_existed() {
        let storage = test_storage();
        let path = storage.paths().record("Note", "gone");
        storage.write_text(&path, "x").unwrap();

        assert!(storage.exists(&path));
        assert!(storage.delete(&path).unwrap());
        assert!(!storage.exists(&path));
        assert!(!storage.delete(&path).unwrap());

        cleanup_storage(&storage);
    }
}
