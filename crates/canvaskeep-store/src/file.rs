//! Directory-backed store: one MessagePack file per document.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::record::DocumentRecord;
use crate::DocumentStore;

/// Get the default data directory for persisted documents
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("canvaskeep")
}

/// Persists each document as `<hex(id)>.canvas` under a root directory.
///
/// Writes to one id are serialized, so overlapping puts never share a
/// half-written temp file and the last put issued is the one left on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    writers: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writers: Arc::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Ids are opaque; hex keeps them from ever being read as a path.
    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.canvas", hex::encode(id.as_bytes())))
    }

    fn writer_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(writers.entry(id.to_string()).or_default())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = rmp_serde::from_slice(&bytes)?;
        debug!(path = %path.display(), "loaded document");
        Ok(Some(record))
    }

    async fn put(&self, id: &str, record: DocumentRecord) -> Result<()> {
        record.canvas.check_storable()?;
        let bytes = rmp_serde::to_vec_named(&record)?;

        // FIFO lock: puts for one id land in the order they were issued
        let writer = self.writer_for(id);
        let _held = writer.lock().await;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(id);
        let tmp = path.with_extension("canvas.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "saved document");
        Ok(())
    }
}
