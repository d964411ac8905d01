//! Filename sanitisation and extension allow-lists.

use crate::IntakeError;

/// A fixed set of accepted file extensions (lower-case, no dot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowList {
    extensions: &'static [&'static str],
}

impl AllowList {
    /// Extensions accepted for upload and storage.
    pub const UPLOADS: AllowList = AllowList {
        extensions: &["png", "jpg", "jpeg"],
    };

    /// Extensions the console reads and lists. Adds `bmp`, which is never
    /// accepted for upload.
    pub const READABLE: AllowList = AllowList {
        extensions: &["png", "jpg", "jpeg", "bmp"],
    };

    pub fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    /// Whether `name` has an extension and it is in this list.
    pub fn permits(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| self.extensions.contains(&ext.as_str()))
    }
}

/// Lower-cased suffix after the last `.`. `None` for "photo", "photo." and
/// dot-files such as ".png".
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Keeps the last path segment, turns whitespace into `_`, drops anything
/// outside `[A-Za-z0-9._-]` and trims leading/trailing `.` and `_`.
/// Returns `None` if nothing is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            _ => None,
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Validate an uploaded filename and return the name it will be stored under.
pub fn validate_upload(name: &str) -> Result<String, IntakeError> {
    if name.trim().is_empty() {
        return Err(IntakeError::EmptyFilename);
    }
    let safe = sanitize_filename(name).ok_or(IntakeError::EmptyFilename)?;
    if !AllowList::UPLOADS.permits(&safe) {
        return Err(IntakeError::DisallowedExtension(name.to_string()));
    }
    Ok(safe)
}
