use crate::domain::EvidenceUpload;
use crate::infrastructure::sha256_digest;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

const PAYMENTS_DIR: &str = "payments";

#[derive(Error, Debug)]
pub enum EvidenceStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("Invalid evidence path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvidence {
    /// Relative to the store root, e.g. `payments/<uuid>.png`.
    pub relative_path: String,
    pub sha256: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn save(&self, upload: &EvidenceUpload) -> Result<StoredEvidence, EvidenceStoreError>;
    async fn remove(&self, relative_path: &str) -> Result<(), EvidenceStoreError>;
}

/// Evidence kept on the local filesystem under a root directory.
pub struct LocalEvidenceStore {
    root: PathBuf,
}

impl LocalEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, EvidenceStoreError> {
        let rel = Path::new(relative_path);
        let safe = !relative_path.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(EvidenceStoreError::InvalidPath(relative_path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl EvidenceStore for LocalEvidenceStore {
    async fn save(&self, upload: &EvidenceUpload) -> Result<StoredEvidence, EvidenceStoreError> {
        let ext = upload
            .image_extension()
            .ok_or_else(|| EvidenceStoreError::UnsupportedType(upload.content_type.clone()))?;

        let relative_path = format!("{}/{}.{}", PAYMENTS_DIR, Uuid::new_v4(), ext);
        let full = self.resolve(&relative_path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, &upload.bytes).await?;

        Ok(StoredEvidence {
            relative_path,
            sha256: sha256_digest(&upload.bytes),
        })
    }

    async fn remove(&self, relative_path: &str) -> Result<(), EvidenceStoreError> {
        let full = self.resolve(relative_path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
