//! Profile images saved on disk, one per username.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::config;

/// Known image MIME types. `jpeg` comes before `jpg` to be picked for
/// `image/jpeg`.
const MIME_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
];

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Max file size exceeded the {limit} bytes limit")]
    TooLarge { limit: usize },
    #[error("Supported file formats are: {}", .supported.join(", "))]
    Unsupported { supported: Vec<String> },
    #[error("no file was sent to the server")]
    NoFile,
    #[error("profile image not found")]
    NotFound,
    #[error("`{0}` cannot own a profile image")]
    InvalidOwner(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Image read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Profile images folder.
#[derive(Debug, Clone)]
pub struct ImageStore {
    folder: PathBuf,
    max_file_size: usize,
    extensions: Vec<String>,
}

impl ImageStore {
    /// Create a new [`ImageStore`], creating its folder when missing.
    pub async fn new(config: &config::Images) -> Result<Self, ImageError> {
        tokio::fs::create_dir_all(&config.folder).await?;

        Ok(Self {
            folder: config.folder.clone(),
            max_file_size: config.max_file_size,
            extensions: config
                .supported_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Extension to save an upload of `content_type` with.
    pub fn extension_for(&self, content_type: Option<&str>) -> Result<&'static str, ImageError> {
        let unsupported = || ImageError::Unsupported {
            supported: self.extensions.clone(),
        };
        let content_type = content_type.ok_or_else(unsupported)?;

        MIME_TYPES
            .iter()
            .find(|(_, mime)| mime.eq_ignore_ascii_case(content_type))
            .map(|(ext, _)| *ext)
            .filter(|ext| self.extensions.iter().any(|supported| supported == ext))
            .ok_or_else(unsupported)
    }

    /// Read the profile image of `owner`, if any.
    pub async fn find(&self, owner: &str) -> Result<Option<Image>, ImageError> {
        if check_owner(owner).is_err() {
            return Ok(None);
        }

        for ext in &self.extensions {
            match tokio::fs::read(self.path(owner, ext)).await {
                Ok(bytes) => {
                    return Ok(Some(Image {
                        content_type: content_type(ext),
                        bytes,
                    }));
                },
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(None)
    }

    /// Replace the profile image of `owner`.
    ///
    /// The upload lands on a temporary file first, so a failed write leaves
    /// the previous image in place.
    pub async fn store(&self, owner: &str, ext: &str, bytes: &[u8]) -> Result<(), ImageError> {
        check_owner(owner)?;
        if bytes.len() > self.max_file_size {
            return Err(ImageError::TooLarge {
                limit: self.max_file_size,
            });
        }

        let tmp = self.folder.join(format!("{owner}_tmp.{ext}"));
        tokio::fs::write(&tmp, bytes).await?;

        if let Err(err) = self.remove_all(owner).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }
        tokio::fs::rename(&tmp, self.path(owner, ext)).await?;

        tracing::debug!(owner, ext, size = bytes.len(), "profile image stored");
        Ok(())
    }

    /// Delete the profile image of `owner`.
    pub async fn remove(&self, owner: &str) -> Result<(), ImageError> {
        if check_owner(owner).is_err() {
            return Err(ImageError::NotFound);
        }

        match self.remove_all(owner).await? {
            0 => Err(ImageError::NotFound),
            _ => Ok(()),
        }
    }

    async fn remove_all(&self, owner: &str) -> Result<usize, ImageError> {
        let mut removed = 0;

        for ext in &self.extensions {
            match tokio::fs::remove_file(self.path(owner, ext)).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {},
                Err(err) => return Err(err.into()),
            }
        }

        Ok(removed)
    }

    fn path(&self, owner: &str, ext: &str) -> PathBuf {
        self.folder.join(format!("{owner}.{ext}"))
    }
}

/// Owners become file names: only the username charset is allowed.
fn check_owner(owner: &str) -> Result<(), ImageError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || ",.&-'".contains(c);

    if !owner.is_empty() && owner.chars().all(allowed) {
        Ok(())
    } else {
        Err(ImageError::InvalidOwner(owner.to_owned()))
    }
}

fn content_type(ext: &str) -> &'static str {
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(dir: &tempfile::TempDir) -> ImageStore {
        let config = config::Images {
            folder: dir.path().join("images"),
            max_file_size: 16,
            ..Default::default()
        };
        ImageStore::new(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_extension_for() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert_eq!(store.extension_for(Some("image/png")).unwrap(), "png");
        assert_eq!(store.extension_for(Some("image/jpeg")).unwrap(), "jpeg");
        assert!(matches!(
            store.extension_for(Some("image/webp")),
            Err(ImageError::Unsupported { .. })
        ));
        assert!(matches!(
            store.extension_for(None),
            Err(ImageError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_replaces_previous_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        store.store("alice", "png", b"png bytes").await.unwrap();
        store.store("alice", "gif", b"gif bytes").await.unwrap();

        let image = store.find("alice").await.unwrap().unwrap();
        assert_eq!(image.content_type, "image/gif");
        assert_eq!(image.bytes, b"gif bytes");
        assert!(!dir.path().join("images/alice.png").exists());
        assert!(!dir.path().join("images/alice_tmp.gif").exists());
    }

    #[tokio::test]
    async fn test_store_rejects_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert!(matches!(
            store.store("alice", "png", &[0; 17]).await,
            Err(ImageError::TooLarge { limit: 16 })
        ));
        assert_eq!(store.find("alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert!(matches!(store.remove("alice").await, Err(ImageError::NotFound)));

        store.store("alice", "png", b"png bytes").await.unwrap();
        store.remove("alice").await.unwrap();
        assert_eq!(store.find("alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_owner_cannot_escape_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert!(matches!(
            store.store("../alice", "png", b"x").await,
            Err(ImageError::InvalidOwner(_))
        ));
        assert_eq!(store.find("../alice").await.unwrap(), None);
        assert!(matches!(store.remove("a/b").await, Err(ImageError::NotFound)));
    }
}
