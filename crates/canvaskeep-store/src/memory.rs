//! Volatile in-process store.
//!
//! Useful for offline sessions and for tests: it counts writes and can be
//! told to fail reads or writes to simulate a flaky transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::record::DocumentRecord;
use crate::DocumentStore;

/// In-memory document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, DocumentRecord>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without counting it as a write or validating it
    pub fn insert(&self, id: impl Into<String>, record: DocumentRecord) {
        self.docs().insert(id.into(), record);
    }

    /// Current record for `id`
    pub fn record(&self, id: &str) -> Option<DocumentRecord> {
        self.docs().get(id).cloned()
    }

    /// Number of successful `put` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every following `get` fail until reset
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every following `put` fail until reset
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn docs(&self) -> MutexGuard<'_, HashMap<String, DocumentRecord>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read rejected".into()));
        }
        Ok(self.record(id))
    }

    async fn put(&self, id: &str, record: DocumentRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".into()));
        }
        record.canvas.check_storable()?;
        self.docs().insert(id.to_string(), record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
