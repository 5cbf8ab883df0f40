use crate::error::Error;
use crate::geo::DynGeolocator;
use crate::notify::{message, Notifier};
use crate::record::{Interaction, NewRecord, StoredRecord};
use crate::record_store::DynRecordStore;
use std::net::IpAddr;
use std::sync::Arc;

pub type SharedSink = Arc<Sink>;

/// Locates, persists and announces interactions from every producer.
///
/// Persistence and notification are not transactional: once a record is appended it stays
/// appended, even if the notification that follows fails.
pub struct Sink {
    geolocator: DynGeolocator,
    record_store: DynRecordStore,
    notifier: Arc<Notifier>,
}

impl Sink {
    #[must_use]
    pub fn new(
        geolocator: DynGeolocator,
        record_store: DynRecordStore,
        notifier: Arc<Notifier>,
    ) -> Self {
        Sink {
            geolocator,
            record_store,
            notifier,
        }
    }

    /// Record an interaction observed from `source_ip`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Geolocation`] if the source can't be located. Nothing is persisted
    /// in that case.
    ///
    /// Otherwise returns the errors of [`Sink::record_located`].
    pub async fn record(
        &self,
        interaction: Interaction,
        source_ip: IpAddr,
    ) -> Result<StoredRecord, Error> {
        let location = self.locate(source_ip).await?;
        self.record_located(interaction, source_ip, location).await
    }

    /// Resolve the location of `source_ip`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Geolocation`] if the source can't be located.
    pub async fn locate(&self, source_ip: IpAddr) -> Result<String, Error> {
        self.geolocator.geolocate(source_ip).await
    }

    /// Persist and announce an interaction whose source was already located with
    /// [`Sink::locate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the record store rejects the append.
    ///
    /// Returns [`Error::NotifyFailed`] if the notification couldn't be delivered. The record
    /// has been persisted when this is returned.
    pub async fn record_located(
        &self,
        interaction: Interaction,
        source_ip: IpAddr,
        location: String,
    ) -> Result<StoredRecord, Error> {
        let new_record = NewRecord::new(interaction, source_ip, location);

        let stored = self
            .record_store
            .write()
            .await
            .append(new_record)
            .await
            .map_err(|err| Error::Persistence(Box::new(err)))?;
        tracing::info!(
            id = stored.id,
            kind = %stored.kind,
            ip = %stored.ip,
            "recorded interaction: {}",
            stored.record
        );

        self.notifier
            .send_markdown(&message::detection_title(stored.kind), &message::detection(&stored))
            .await?;
        Ok(stored)
    }
}
