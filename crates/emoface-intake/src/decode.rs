//! Image decoding for stored uploads and in-memory buffers.

use crate::IntakeError;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Decode an image from memory, guessing the format from its content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, IntakeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| IntakeError::Decode {
            path: None,
            reason: e.to_string(),
        })?
        .decode()
        .map_err(|e| IntakeError::Decode {
            path: None,
            reason: e.to_string(),
        })
}

/// Open and decode an image file. The format is guessed from content, so a
/// misnamed file still decodes.
pub fn load_image(path: &Path) -> Result<DynamicImage, IntakeError> {
    if !path.is_file() {
        return Err(IntakeError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| IntakeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decode_image(&bytes).map_err(|e| match e {
        IntakeError::Decode { reason, .. } => IntakeError::Decode {
            path: Some(path.to_path_buf()),
            reason,
        },
        other => other,
    })?;

    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "image decoded"
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(w, h)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_valid_png() {
        let image = decode_image(&png_bytes(8, 6)).unwrap();
        assert_eq!((image.width(), image.height()), (8, 6));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, IntakeError::Decode { path: None, .. }));
    }

    #[test]
    fn test_load_misnamed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        std::fs::write(&path, png_bytes(4, 4)).unwrap();
        assert!(load_image(&path).is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("ghost.png")).unwrap_err();
        assert!(matches!(err, IntakeError::NotFound(_)));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"\xff\xd8 truncated").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, IntakeError::Decode { path: Some(_), .. }));
        assert!(err.to_string().starts_with("could not read image"));
    }
}
