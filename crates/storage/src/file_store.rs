//! Binary storage for image and evidence files.
//!
//! Image files are addressed by the relative path recorded in the catalog;
//! evidence files get generated ULID names. Only the path is ever handed to
//! the tracker, never the bytes.

use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::trait_::{Result, StorageError};

const IMAGES_DIR: &str = "imgs";
const EVIDENCE_DIR: &str = "evidence";

/// Directory-backed file store.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. Call [`FileStore::init`] before use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory layout.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.root.join(IMAGES_DIR)).await?;
        tokio::fs::create_dir_all(self.root.join(EVIDENCE_DIR)).await?;
        Ok(())
    }

    /// Read a catalog image.
    pub async fn read_image(&self, rel_path: &str) -> Result<Vec<u8>> {
        let path = resolve(&self.root.join(IMAGES_DIR), rel_path)?;
        read(&path, rel_path).await
    }

    /// Write an evidence file under a fresh name and return that name.
    pub async fn write_evidence(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let name = format!("{}.{}", ulid::Ulid::new(), sanitize_extension(extension));
        let path = self.root.join(EVIDENCE_DIR).join(&name);
        tokio::fs::write(&path, bytes).await?;
        debug!(file = %name, bytes = bytes.len(), "Wrote evidence file");
        Ok(name)
    }

    /// Delete an evidence file. A file that is already gone is not an error.
    pub async fn remove_evidence(&self, rel_path: &str) -> Result<()> {
        let path = resolve(&self.root.join(EVIDENCE_DIR), rel_path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file = %rel_path, "Removed evidence file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Best-effort MIME type from a file name.
pub fn content_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Join `rel_path` onto `base`, refusing anything that could escape it.
fn resolve(base: &Path, rel_path: &str) -> Result<PathBuf> {
    let rel = Path::new(rel_path);
    let plain = !rel_path.is_empty()
        && rel
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !plain {
        return Err(StorageError::InvalidPath(rel_path.to_string()));
    }
    Ok(base.join(rel))
}

async fn read(path: &Path, rel_path: &str) -> Result<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::NotFound(format!("file '{rel_path}'")))
        }
        Err(e) => Err(e.into()),
    }
}

fn sanitize_extension(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        ext
    } else {
        "bin".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_evidence_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.init().await.unwrap();

        let name = store.write_evidence(b"jpeg bytes", "JPG").await.unwrap();
        assert!(name.ends_with(".jpg"));
        let written = tokio::fs::read(dir.path().join("evidence").join(&name))
            .await
            .unwrap();
        assert_eq!(written, b"jpeg bytes");

        let other = store.write_evidence(b"x", "jpg").await.unwrap();
        assert_ne!(name, other);
    }

    #[tokio::test]
    async fn test_remove_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.init().await.unwrap();

        let name = store.write_evidence(b"jpeg bytes", "jpg").await.unwrap();
        store.remove_evidence(&name).await.unwrap();
        assert!(!dir.path().join("evidence").join(&name).exists());

        // Already gone.
        store.remove_evidence(&name).await.unwrap();
        assert!(matches!(
            store.remove_evidence("../imgs/a.jpg").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_read_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.init().await.unwrap();
        tokio::fs::create_dir_all(dir.path().join("imgs/park")).await.unwrap();
        tokio::fs::write(dir.path().join("imgs/park/1.png"), b"png").await.unwrap();

        assert_eq!(store.read_image("park/1.png").await.unwrap(), b"png");
        assert!(matches!(
            store.read_image("park/2.png").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.init().await.unwrap();

        for bad in ["../secret", "/etc/passwd", "a/../../b", "", "./x"] {
            assert!(
                matches!(store.read_image(bad).await, Err(StorageError::InvalidPath(_))),
                "{bad} was accepted"
            );
        }
    }

    #[test]
    fn test_extension_and_content_type() {
        assert_eq!(sanitize_extension(".PNG"), "png");
        assert_eq!(sanitize_extension("j/pg"), "bin");
        assert_eq!(sanitize_extension(""), "bin");
        assert_eq!(content_type("a/b.JPEG"), "image/jpeg");
        assert_eq!(content_type("noext"), "application/octet-stream");
    }
}
