use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No files uploaded.")]
    NoFiles,
    #[error("File {name} exceeds the {limit} byte limit.")]
    TooLarge { name: String, limit: usize },
    #[error("File {0} has an unsupported format. Allowed: .jpg, .jpeg, .png, .webp")]
    InvalidFormat(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A file written to the upload directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
}

pub struct UploadService {
    upload_dir: PathBuf,
    max_bytes: usize,
}

impl UploadService {
    pub fn new(upload_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_bytes,
        }
    }

    /// Check name and size and return the lowercased extension.
    pub fn validate(&self, file: &IncomingFile) -> Result<String, UploadError> {
        let extension = Path::new(&file.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| UploadError::InvalidFormat(file.file_name.clone()))?;

        if file.bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                name: file.file_name.clone(),
                limit: self.max_bytes,
            });
        }

        Ok(extension)
    }

    /// Validate every file first, then write them under random names.
    pub async fn store_all(&self, files: &[IncomingFile]) -> Result<Vec<StoredFile>, UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let extensions = files
            .iter()
            .map(|f| self.validate(f))
            .collect::<Result<Vec<_>, _>>()?;

        fs::create_dir_all(&self.upload_dir).await?;

        let mut stored = Vec::with_capacity(files.len());
        for (file, extension) in files.iter().zip(extensions) {
            let name = format!("{}.{}", Uuid::new_v4().simple(), extension);
            let path = self.upload_dir.join(&name);
            if let Err(e) = fs::write(&path, &file.bytes).await {
                self.remove_all(&stored).await;
                return Err(e.into());
            }
            stored.push(StoredFile {
                path,
                url: format!("{}/{}", UPLOAD_URL_PREFIX, name),
            });
        }

        tracing::debug!("Stored {} uploaded files", stored.len());
        Ok(stored)
    }

    pub async fn store_one(&self, file: &IncomingFile) -> Result<StoredFile, UploadError> {
        let mut stored = self.store_all(std::slice::from_ref(file)).await?;
        stored.pop().ok_or(UploadError::NoFiles)
    }

    /// Best-effort cleanup after a failed request.
    pub async fn remove_all(&self, files: &[StoredFile]) {
        for file in files {
            if let Err(e) = fs::remove_file(&file.path).await {
                tracing::warn!("Failed to remove {}: {}", file.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, len: usize) -> IncomingFile {
        IncomingFile {
            file_name: name.to_string(),
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn test_validate_extensions() {
        let service = UploadService::new("unused", 100);
        assert_eq!(service.validate(&file("a.JPG", 1)).unwrap(), "jpg");
        assert_eq!(service.validate(&file("b.webp", 1)).unwrap(), "webp");
        assert!(matches!(
            service.validate(&file("c.gif", 1)),
            Err(UploadError::InvalidFormat(_))
        ));
        assert!(matches!(
            service.validate(&file("noext", 1)),
            Err(UploadError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_validate_size_limit() {
        let service = UploadService::new("unused", 100);
        assert!(service.validate(&file("a.png", 100)).is_ok());
        assert!(matches!(
            service.validate(&file("a.png", 101)),
            Err(UploadError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_all_writes_random_names() {
        let dir = tempfile::tempdir().unwrap();
        let service = UploadService::new(dir.path(), 1024);

        let stored = service
            .store_all(&[file("one.png", 3), file("two.jpeg", 4)])
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_ne!(stored[0].url, stored[1].url);
        assert!(stored[0].url.starts_with("/uploads/"));
        assert!(stored[1].url.ends_with(".jpeg"));
        assert_eq!(std::fs::read(&stored[1].path).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_store_all_rejects_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let service = UploadService::new(dir.path().join("nested"), 1024);

        let result = service
            .store_all(&[file("ok.png", 3), file("bad.exe", 3)])
            .await;
        assert!(matches!(result, Err(UploadError::InvalidFormat(_))));
        assert!(!dir.path().join("nested").exists());

        assert!(matches!(
            service.store_all(&[]).await,
            Err(UploadError::NoFiles)
        ));
    }
}
