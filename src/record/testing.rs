//! Fakes for exercising interaction producers without a network.

use crate::geo::FixedGeolocator;
use crate::notify::{Format, MessagingBackend, Notifier, SendError};
use crate::record::{SharedSink, Sink};
use crate::record_store::{DynRecordStore, InMemoryRecordStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// A messaging backend that keeps what it was asked to send.
#[derive(Default)]
pub(crate) struct Outbox {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl Outbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Outbox::default())
    }

    /// An outbox whose every delivery attempt fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Outbox {
            fail: true,
            ..Outbox::default()
        })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MessagingBackend for Arc<Outbox> {
    async fn send(&self, text: &str, _format: Format) -> Result<(), SendError> {
        if self.fail {
            return Err(SendError::new("chat not found"));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A sink over an in-memory store, locating every address in "Lab".
pub(crate) fn memory_sink(outbox: &Arc<Outbox>) -> (SharedSink, Arc<RwLock<InMemoryRecordStore>>) {
    let store = Arc::new(RwLock::new(InMemoryRecordStore::default()));
    let dyn_store: DynRecordStore = store.clone();
    let notifier = Notifier::new(Box::new(Arc::clone(outbox)), Duration::ZERO);
    let sink = Sink::new(
        Arc::new(FixedGeolocator::new("Lab")),
        dyn_store,
        Arc::new(notifier),
    );
    (Arc::new(sink), store)
}
