//! Input resolution: turn a user-supplied path into an uploadable document.
//!
//! Validation happens before any network traffic so a wrong file never
//! costs a presigned URL: the file must exist and be readable, be non-empty,
//! stay under the size limit, and have a content type the service accepts.
//! The content type is guessed from the extension only; file contents are
//! never sniffed.

use crate::config::ClientConfig;
use crate::error::D2xError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An in-memory document ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// File name sent to the service (no directory part).
    pub file_name: String,
    /// MIME type used for the presigned URL and the upload PUT.
    pub content_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for DocumentFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl DocumentFile {
    /// Wrap bytes already in memory. The content type is guessed from
    /// `file_name` when not given.
    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        let file_name = file_name.into();
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(&file_name));
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// MIME type for a file name, `application/octet-stream` when unknown.
pub fn guess_content_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Check a document against the upload rules in `config`.
pub fn validate(doc: &DocumentFile, path: &Path, config: &ClientConfig) -> Result<(), D2xError> {
    if doc.is_empty() {
        return Err(D2xError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    let size = doc.len() as u64;
    if size > config.max_file_size {
        return Err(D2xError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit: config.max_file_size,
        });
    }
    if !config.is_allowed_content_type(&doc.content_type) {
        return Err(D2xError::UnsupportedFormat {
            path: path.to_path_buf(),
            content_type: doc.content_type.clone(),
        });
    }
    Ok(())
}

/// Read and validate a local file.
pub async fn resolve_input(
    path: impl AsRef<Path>,
    config: &ClientConfig,
) -> Result<DocumentFile, D2xError> {
    let path = path.as_ref();
    let to_input_err = |e: std::io::Error, path: PathBuf| match e.kind() {
        std::io::ErrorKind::PermissionDenied => D2xError::PermissionDenied { path },
        _ => D2xError::FileNotFound { path },
    };

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| to_input_err(e, path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(D2xError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    // Size check before reading so an oversized file is never loaded.
    if meta.len() > config.max_file_size {
        return Err(D2xError::FileTooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit: config.max_file_size,
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| to_input_err(e, path.to_path_buf()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let doc = DocumentFile::from_bytes(file_name, None, bytes);
    validate(&doc, path, config)?;

    debug!(
        "Resolved input {} ({}, {} bytes)",
        path.display(),
        doc.content_type,
        doc.len()
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, bytes).unwrap();
        p
    }

    #[test]
    fn guesses_common_types() {
        assert_eq!(guess_content_type("a.pdf"), "application/pdf");
        assert_eq!(guess_content_type("a.JPG"), "image/jpeg");
        assert_eq!(guess_content_type("a.png"), "image/png");
        assert_eq!(guess_content_type("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn resolves_valid_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "receipt.pdf", b"%PDF-1.7 test");
        let doc = resolve_input(&p, &ClientConfig::default()).await.unwrap();
        assert_eq!(doc.file_name, "receipt.pdf");
        assert_eq!(doc.content_type, "application/pdf");
        assert_eq!(doc.len(), 13);
    }

    #[tokio::test]
    async fn missing_file() {
        let err = resolve_input("/definitely/not/here.pdf", &ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, D2xError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path(), &ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, D2xError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "clip.mp4", b"\0\0\0\x18ftypmp42");
        let err = resolve_input(&p, &ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, D2xError::UnsupportedFormat { .. }), "got {err}");
    }

    #[tokio::test]
    async fn accepts_pdf_with_leading_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(&dir, "scan.pdf", b"\xEF\xBB\xBF%PDF-1.4\n%%EOF\n");
        let doc = resolve_input(&p, &ClientConfig::default()).await.unwrap();
        assert_eq!(doc.content_type, "application/pdf");
        assert!(doc.bytes.starts_with(b"\xEF\xBB\xBF"));
    }

    #[tokio::test]
    async fn rejects_oversized_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::builder().max_file_size(8).build().unwrap();

        let p = write(&dir, "big.png", &[0u8; 9]);
        let err = resolve_input(&p, &config).await.unwrap_err();
        assert!(matches!(err, D2xError::FileTooLarge { size: 9, limit: 8, .. }));

        let p = write(&dir, "empty.png", b"");
        let err = resolve_input(&p, &config).await.unwrap_err();
        assert!(matches!(err, D2xError::EmptyFile { .. }));
    }

    #[test]
    fn from_bytes_keeps_explicit_type() {
        let doc = DocumentFile::from_bytes("scan", Some("image/tiff"), vec![1, 2, 3]);
        assert_eq!(doc.content_type, "image/tiff");
        assert!(format!("{doc:?}").contains("len: 3"));
    }
}
