//! Loading a cattle photo from disk.

use anyhow::{bail, Context, Result};
use gaugyan_common::ImagePayload;
use std::path::Path;

/// Media type for a photo path, from its extension
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

pub fn load_image(path: &Path) -> Result<ImagePayload> {
    let Some(media_type) = media_type_for(path) else {
        bail!(
            "Unsupported image type: {} (expected jpg, jpeg, png, webp, gif or heic)",
            path.display()
        );
    };

    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    ImagePayload::new(media_type, bytes).with_context(|| format!("Invalid image {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_types() {
        assert_eq!(media_type_for(Path::new("cow.JPG")), Some("image/jpeg"));
        assert_eq!(media_type_for(Path::new("cow.jpeg")), Some("image/jpeg"));
        assert_eq!(media_type_for(Path::new("buffalo.heic")), Some("image/heic"));
        assert_eq!(media_type_for(Path::new("notes.txt")), None);
        assert_eq!(media_type_for(Path::new("noext")), None);
    }

    #[test]
    fn test_load_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cow.png");
        std::fs::write(&path, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.media_type(), "image/png");
        assert!(image.to_data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, []).unwrap();
        assert!(load_image(&path).is_err());
    }
}
