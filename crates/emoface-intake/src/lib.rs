//! emoface-intake — getting images in.
//!
//! Validates client filenames against extension allow-lists, stores uploads
//! in a fixed directory and decodes images for inference.

pub mod decode;
pub mod store;
pub mod validate;

use std::path::PathBuf;
use thiserror::Error;

pub use decode::{decode_image, load_image};
pub use store::{StoredUpload, UploadStore};
pub use validate::{extension_of, sanitize_filename, validate_upload, AllowList};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("no file was submitted")]
    MissingFile,
    #[error("empty filename")]
    EmptyFilename,
    #[error("file type not allowed: {0}")]
    DisallowedExtension(String),
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("could not read image{}: {reason}", path_suffix(.path))]
    Decode {
        path: Option<PathBuf>,
        reason: String,
    },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntakeError {
    /// Validation failures: the request is ignored rather than reported.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            IntakeError::MissingFile | IntakeError::EmptyFilename | IntakeError::DisallowedExtension(_)
        )
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" '{}'", p.display()),
        None => String::new(),
    }
}
