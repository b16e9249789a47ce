//! Recipe images on disk. Paths handed out are relative to the media root,
//! which is also what `/media` serves.

use std::{io::ErrorKind, path::Path};

use crate::{
    constants::{IMAGE_TYPES, IMAGE_UPLOAD_DIR},
    error::Error,
};

/// File extension for an accepted image `Content-Type`. Parameters after `;`
/// are ignored.
pub fn image_extension(content_type: &str) -> Result<&'static str, Error> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    IMAGE_TYPES
        .iter()
        .find(|(accepted, _)| *accepted == mime)
        .map(|(_, extension)| *extension)
        .ok_or_else(|| {
            Error::validation(
                "image",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            )
        })
}

/// Writes `bytes` under a fresh random name and returns the relative path.
pub async fn store_image(
    media_root: &Path,
    content_type: &str,
    bytes: &[u8],
) -> Result<String, Error> {
    let extension = image_extension(content_type)?;
    if bytes.is_empty() {
        return Err(Error::validation("image", "The submitted file is empty."));
    }

    let directory = media_root.join(IMAGE_UPLOAD_DIR);
    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(|e| Error::Internal(format!("Could not create {}: {e}", directory.display())))?;

    let file_name = format!("{}.{extension}", uuid::Uuid::new_v4());
    let path = directory.join(&file_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Error::Internal(format!("Could not write {}: {e}", path.display())))?;

    log::trace!("> Stored {} bytes at {}", bytes.len(), path.display());
    Ok(format!("{IMAGE_UPLOAD_DIR}/{file_name}"))
}

/// Best effort: a missing file is fine, other failures are only logged.
pub async fn remove_image(media_root: &Path, relative: &str) {
    let path = media_root.join(relative);

    match tokio::fs::remove_file(&path).await {
        Ok(()) => log::trace!("> Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_types_map_to_extensions() {
        assert_eq!(image_extension("image/png").unwrap(), "png");
        assert_eq!(image_extension("IMAGE/JPEG; charset=binary").unwrap(), "jpg");
        assert!(matches!(
            image_extension("text/plain"),
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn stored_image_lands_under_upload_dir() {
        let root = tempfile::tempdir().unwrap();
        let relative = store_image(root.path(), "image/png", b"\x89PNG")
            .await
            .unwrap();

        assert!(relative.starts_with(IMAGE_UPLOAD_DIR));
        assert!(relative.ends_with(".png"));
        assert_eq!(std::fs::read(root.path().join(&relative)).unwrap(), b"\x89PNG");

        remove_image(root.path(), &relative).await;
        assert!(!root.path().join(&relative).exists());
        // Second removal is a no-op.
        remove_image(root.path(), &relative).await;
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let result = store_image(root.path(), "image/gif", b"").await;

        assert!(matches!(result, Err(Error::Validation { .. })));
    }
}
