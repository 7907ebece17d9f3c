//! Record Store Sync: the in-memory copy of backend records, kept in step
//! with the [`MarkerRegistry`].
//!
//! Every mutating method talks to the backend first and only touches local
//! state once the backend call has succeeded. Local state and markers are
//! then updated together without a suspension point in between, so callers
//! never observe the store and the marker set disagreeing.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, StreamExt};
use rtumap_backend::{PersistenceError, SaveUploadForm};
use rtumap_core::{LocationRecord, RecordId};

use crate::markers::MarkerRegistry;
use crate::services::{Geocoder, RecordBackend};

/// In-flight forward-geocode requests allowed while repairing records.
pub const DEFAULT_REPAIR_CONCURRENCY: usize = 4;

#[derive(Default)]
struct StoreState {
    /// Located records, in backend order.
    records: Vec<LocationRecord>,
    /// Records that could not be placed on the map.
    unlocated: Vec<LocationRecord>,
}

pub struct RecordStoreSync {
    backend: Arc<dyn RecordBackend>,
    geocoder: Arc<dyn Geocoder>,
    registry: Arc<MarkerRegistry>,
    repair_concurrency: usize,
    state: Mutex<StoreState>,
}

impl RecordStoreSync {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        geocoder: Arc<dyn Geocoder>,
        registry: Arc<MarkerRegistry>,
    ) -> Self {
        Self {
            backend,
            geocoder,
            registry,
            repair_concurrency: DEFAULT_REPAIR_CONCURRENCY,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Caps concurrent address repairs during [`RecordStoreSync::refresh`].
    /// Zero is treated as one.
    #[must_use]
    pub fn with_repair_concurrency(mut self, max_concurrent: usize) -> Self {
        self.repair_concurrency = max_concurrent.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persists a draft record and shows its marker.
    ///
    /// The backend does not echo coordinates back, so the draft's are kept.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`PersistenceError`]; local state and markers
    /// are left unchanged.
    pub async fn create(&self, record: LocationRecord) -> Result<LocationRecord, PersistenceError> {
        let form = SaveUploadForm::from_record(&record);
        let mut saved = self.backend.save(&form).await?;
        if saved.coordinates.is_none() {
            saved.coordinates = record.coordinates;
        }
        if saved.address.trim().is_empty() {
            saved.address = record.address;
        }

        let mut state = self.lock();
        if saved.is_persisted() {
            upsert_record(&mut state.records, saved.clone());
            self.registry.upsert(&saved);
        } else {
            tracing::warn!(id = ?saved.id, "saved record has no location; keeping it off the map");
            state.unlocated.push(saved.clone());
        }
        tracing::info!(
            id = ?saved.id,
            rtu_count = saved.rtu_count,
            lead_score = %saved.lead_score,
            "record persisted"
        );
        Ok(saved)
    }

    /// Deletes a record on the backend, then drops it locally.
    ///
    /// Ids without a marker or without a local copy are tolerated.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`PersistenceError`] (including
    /// [`PersistenceError::NotFound`]); local state is left unchanged.
    pub async fn delete(&self, id: RecordId) -> Result<(), PersistenceError> {
        self.backend.delete(id).await?;

        let mut state = self.lock();
        state.records.retain(|r| r.id != Some(id));
        state.unlocated.retain(|r| r.id != Some(id));
        self.registry.remove(id);
        tracing::info!(%id, "record deleted");
        Ok(())
    }

    /// Reloads every record from the backend and resynchronizes markers.
    ///
    /// Records without coordinates are forward-geocoded by address, at most
    /// `repair_concurrency` at a time and in backend order. Repair is
    /// best-effort: failures are logged, and records that stay unlocated are
    /// kept out of the returned list and reported by
    /// [`RecordStoreSync::unlocated`].
    ///
    /// # Errors
    ///
    /// Returns the backend's [`PersistenceError`] if the listing fails;
    /// local state is left unchanged.
    pub async fn refresh(&self) -> Result<Vec<LocationRecord>, PersistenceError> {
        let fetched = self.backend.list().await?;
        let repaired: Vec<LocationRecord> = stream::iter(fetched)
            .map(|record| self.repair(record))
            .buffered(self.repair_concurrency)
            .collect()
            .await;

        let (located, unlocated): (Vec<_>, Vec<_>) =
            repaired.into_iter().partition(LocationRecord::is_persisted);
        if !unlocated.is_empty() {
            tracing::warn!(count = unlocated.len(), "records left off the map without a location");
        }

        let mut state = self.lock();
        self.registry.sync(&located);
        state.records.clone_from(&located);
        state.unlocated = unlocated;
        tracing::debug!(count = located.len(), "records refreshed");
        Ok(located)
    }

    async fn repair(&self, mut record: LocationRecord) -> LocationRecord {
        if record.coordinates.is_some() || record.address.trim().is_empty() {
            return record;
        }
        match self.geocoder.forward(&record.address).await {
            Ok(Some(place)) => record.coordinates = place.location,
            Ok(None) => {
                tracing::warn!(id = ?record.id, address = %record.address, "no geocoding match for record address");
            }
            Err(e) => {
                tracing::warn!(id = ?record.id, address = %record.address, error = %e, "address repair failed");
            }
        }
        record
    }

    /// Approves a record on the backend and refreshes its local copy and
    /// marker. Returns the updated record when it is held locally.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`PersistenceError`]; local state is left
    /// unchanged.
    pub async fn approve(&self, id: RecordId) -> Result<Option<LocationRecord>, PersistenceError> {
        let response = self.backend.approve(id).await?;

        let mut state = self.lock();
        let Some(record) = state.records.iter_mut().find(|r| r.id == Some(id)) else {
            return Ok(None);
        };
        record.approved = response.approved;
        if response.approved {
            record.status = "approved".to_string();
        }
        let updated = record.clone();
        self.registry.upsert(&updated);
        tracing::info!(%id, "record approved");
        Ok(Some(updated))
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<LocationRecord> {
        self.lock().records.iter().find(|r| r.id == Some(id)).cloned()
    }

    /// Located records, in backend order.
    #[must_use]
    pub fn records(&self) -> Vec<LocationRecord> {
        self.lock().records.clone()
    }

    #[must_use]
    pub fn unlocated(&self) -> Vec<LocationRecord> {
        self.lock().unlocated.clone()
    }

    #[must_use]
    pub fn ids(&self) -> BTreeSet<RecordId> {
        self.lock().records.iter().filter_map(|r| r.id).collect()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<MarkerRegistry> {
        &self.registry
    }
}

/// Replaces the record with the same id, or appends it.
fn upsert_record(records: &mut Vec<LocationRecord>, record: LocationRecord) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}
