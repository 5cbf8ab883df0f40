use crate::error::Error;
use crate::record::{NewRecord, StoredRecord};
use crate::record_store::RecordStore;
use time::OffsetDateTime;

#[derive(Default, Debug, Clone)]
pub struct InMemoryRecordStore {
    records: Vec<StoredRecord>,
}

impl InMemoryRecordStore {
    /// All stored records, oldest first.
    #[must_use]
    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append(&mut self, record: NewRecord) -> Result<StoredRecord, Error> {
        let id = self.records.last().map_or(1, |last| last.id + 1);
        let stored = StoredRecord::from_new(id, OffsetDateTime::now_utc(), record);
        self.records.push(stored.clone());
        Ok(stored)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
