use std::path::{Path, PathBuf};

use log::*;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("Invalid document name: {0}")]
    InvalidName(String),
    #[error("Document I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores rendered documents as files in a single directory, keyed by invoice number.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, DocumentStoreError> {
        let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DocumentStoreError::InvalidName(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.html")))
    }

    /// Writes (or overwrites) the document and returns its path.
    pub async fn save(&self, key: &str, contents: &str) -> Result<PathBuf, DocumentStoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).await?;
        // Write to a temporary file first so that readers never see a half-written document.
        let tmp = path.with_extension("html.tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, &path).await?;
        debug!("🧾️ Stored document {}", path.display());
        Ok(path)
    }

    pub async fn load(&self, path: &Path) -> Result<Vec<u8>, DocumentStoreError> {
        Ok(fs::read(path).await?)
    }

    /// Removes a document. A missing file is not an error.
    pub async fn remove(&self, path: &Path) -> Result<(), DocumentStoreError> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("🧾️ Removed document {}", path.display());
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
