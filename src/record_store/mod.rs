//! Append-only interaction record storage.
//!
//! Two implementations are provided, [`memory::InMemoryRecordStore`] and
//! [`file::FileRecordStore`]. The former is not durable across restarts. The latter appends
//! each record as a JSON line to a file and continues its IDs after a restart.

use crate::error::Error;
use crate::record::{NewRecord, StoredRecord};
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod file;
pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use file::FileRecordStore;
#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryRecordStore;

/// `DynRecordStore` is a type alias for a [`RecordStore`] shared by every producer, which
/// coordinate through an [`Arc`] and a [`RwLock`] wrapping the [`RecordStore`].
#[allow(clippy::module_name_repetitions)]
pub type DynRecordStore = Arc<RwLock<dyn RecordStore + Send + Sync>>;

/// An async trait describing append-only storage of interaction records.
#[async_trait::async_trait]
pub trait RecordStore {
    /// Append a record, assigning its ID and creation time.
    async fn append(&mut self, record: NewRecord) -> Result<StoredRecord, Error>;

    /// The number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Open the record store: file-backed when a path is given, in-memory otherwise.
///
/// # Errors
///
/// Returns the errors of [`FileRecordStore::try_from_file`].
pub async fn open(path: Option<&str>) -> Result<DynRecordStore, Error> {
    let store: DynRecordStore = match path {
        Some(path) => {
            let store = FileRecordStore::try_from_file(path).await?;
            tracing::info!("loaded {} records from {path}", store.len());
            Arc::new(RwLock::new(store))
        }
        None => {
            tracing::warn!("no record_store_path configured, records will not survive restarts");
            Arc::new(RwLock::new(InMemoryRecordStore::default()))
        }
    };
    Ok(store)
}
