//! A JSON lines file-backed implementation of the [`RecordStore`][super::RecordStore] trait.
//!
//! Each new record is appended as one JSON line to a file on disk. Records are not kept in
//! memory: on open the file is scanned once for the record count and the last assigned ID.
use crate::error::Error;
use crate::record::{NewRecord, StoredRecord};
use crate::record_store::RecordStore;
use std::io::ErrorKind;
use time::OffsetDateTime;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// A file-backed, append-only record store.
#[derive(Default, Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct FileRecordStore {
    path: String,
    len: usize,
    last_id: u64,
}

impl FileRecordStore {
    /// Open a [`FileRecordStore`] on the JSON lines file at the given path, creating an
    /// empty file if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if a line of the file isn't a valid record.
    ///
    /// Returns [`Error::IO`] if the path can't be opened, created or read.
    pub async fn try_from_file(p: &str) -> Result<Self, Error> {
        let mut store = Self {
            path: p.to_string(),
            ..Self::default()
        };
        let f = match File::open(p).await {
            Ok(f) => f,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                File::create(p).await?;
                return Ok(store);
            }
            Err(err) => return Err(Error::IO(err)),
        };

        let mut lines = BufReader::new(f).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredRecord = serde_json::from_str(&line)?;
            store.len += 1;
            store.last_id = store.last_id.max(record.id);
        }
        Ok(store)
    }

    async fn write_line(&self, record: &StoredRecord) -> Result<(), Error> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut output_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        output_file.write_all(line.as_bytes()).await?;
        output_file.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for FileRecordStore {
    async fn append(&mut self, record: NewRecord) -> Result<StoredRecord, Error> {
        let stored = StoredRecord::from_new(self.last_id + 1, OffsetDateTime::now_utc(), record);
        self.write_line(&stored).await?;
        self.len += 1;
        self.last_id = stored.id;
        Ok(stored)
    }

    fn len(&self) -> usize {
        self.len
    }
}
