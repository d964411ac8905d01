//! The uploads directory: write-once blob storage for submitted images.

use crate::validate::{validate_upload, AllowList};
use crate::IntakeError;
use std::path::{Path, PathBuf};

/// An image written to the uploads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Sanitised name the file was stored under.
    pub filename: String,
    pub path: PathBuf,
}

/// Handle to the uploads directory.
///
/// Files are never removed. Saving a name that already exists replaces the
/// earlier file.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Open the store, creating the directory if it does not exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IntakeError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| IntakeError::Io {
            path: root.clone(),
            source,
        })?;
        tracing::debug!(root = %root.display(), "uploads directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate `filename` and write `bytes` under its sanitised name.
    /// Nothing is written when validation fails.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredUpload, IntakeError> {
        let name = validate_upload(filename)?;
        let path = self.root.join(&name);

        if path.exists() {
            tracing::debug!(file = %name, "overwriting existing upload");
        }
        std::fs::write(&path, bytes).map_err(|source| IntakeError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(file = %name, bytes = bytes.len(), "upload stored");

        Ok(StoredUpload {
            filename: name,
            path,
        })
    }

    /// Sorted names of regular files whose extension is in `allow`.
    pub fn list(&self, allow: &AllowList) -> Result<Vec<String>, IntakeError> {
        let io_err = |source| IntakeError::Io {
            path: self.root.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if allow.permits(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Absolute paths pass through; anything else is relative to the root.
    pub fn resolve(&self, input: &str) -> PathBuf {
        let candidate = Path::new(input);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}
