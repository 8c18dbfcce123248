//! Document store gateway for canvaskeep.
//!
//! Documents are addressed by an opaque identifier and hold exactly one
//! [`DocumentRecord`]: the latest canvas value plus its modification time.
//! Writes overwrite; there is no versioning and no concurrency token, the
//! last writer wins.
//!
//! Every backend enforces the storage value model on `put`: scalars, maps and
//! flat sequences are accepted, a sequence directly inside a sequence is not.

mod error;
mod file;
mod memory;
mod record;
mod value;

use async_trait::async_trait;

pub use error::{Result, StoreError};
pub use file::{default_data_dir, FileStore};
pub use memory::MemoryStore;
pub use record::DocumentRecord;
pub use value::{Map, Value};

/// Key-value access to persisted documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the record for `id`, or `None` if it was never saved
    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Replace the record for `id`
    async fn put(&self, id: &str, record: DocumentRecord) -> Result<()>;
}
