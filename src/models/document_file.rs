//! Document file model.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::utils::detect_mime_type;

/// A single file of a document, the unit drivers analyze.
///
/// Serialized as-is into the template context under `document_file`, so
/// every field here is reachable from argument templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    /// Stable identity used in logs, errors, and credential action contexts.
    pub id: String,
    /// Document type of the parent document.
    pub document_type: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    /// SHA-256 of the file content (hex).
    pub checksum: String,
    /// Text content, when the file is valid UTF-8.
    #[serde(default)]
    pub text: Option<String>,
    /// Location on disk, if the file was loaded from one.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Free-form attributes supplied by the caller.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl DocumentFile {
    /// Compute SHA-256 hash of content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Build a document file from in-memory content.
    pub fn from_bytes(
        id: impl Into<String>,
        document_type: impl Into<String>,
        filename: impl Into<String>,
        content: &[u8],
    ) -> Self {
        let filename = filename.into();
        let mime_type = detect_mime_type(Path::new(&filename), content);
        Self {
            id: id.into(),
            document_type: document_type.into(),
            filename,
            mime_type,
            size: content.len() as u64,
            checksum: Self::compute_hash(content),
            text: std::str::from_utf8(content).ok().map(str::to_string),
            path: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Load a document file from disk.
    ///
    /// The id defaults to the first 16 characters of the content hash.
    pub async fn load(path: &Path, document_type: &str) -> Result<Self> {
        let content = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut file = Self::from_bytes(String::new(), document_type, filename, &content);
        file.id = file.checksum[..16].to_string();
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
