//! Shared doubles for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rtumap_backend::{ApprovalResponse, PersistenceError, SaveUploadForm};
use rtumap_core::{Coordinates, LocationRecord, RecordId};
use rtumap_engine::{Geocoder, HeadlessSurface, RecordBackend, Viewport};
use rtumap_geocode::{GeocodeError, GeocodedPlace};

pub fn center() -> Coordinates {
    Coordinates::new(40.4406, -79.9959).unwrap()
}

pub fn surface() -> Arc<HeadlessSurface> {
    Arc::new(HeadlessSurface::with_size(
        Viewport {
            center: center(),
            zoom: 16,
        },
        64,
        48,
    ))
}

pub fn located(id: i64, rtu_count: u32) -> LocationRecord {
    let mut record = LocationRecord {
        id: Some(RecordId(id)),
        building_name: format!("Building {id}"),
        address: format!("{id} Main St"),
        coordinates: Some(center()),
        ..LocationRecord::default()
    };
    record.set_rtu_count(rtu_count);
    record
}

/// Backend double that stores records in memory and, like the real one,
/// does not echo coordinates from `save`.
#[derive(Default)]
pub struct InMemoryBackend {
    next_id: AtomicI64,
    records: Mutex<Vec<LocationRecord>>,
}

impl InMemoryBackend {
    pub fn with_records(records: Vec<LocationRecord>) -> Self {
        let next = records
            .iter()
            .filter_map(|r| r.id)
            .map(|id| id.0)
            .max()
            .unwrap_or(0);
        Self {
            next_id: AtomicI64::new(next),
            records: Mutex::new(records),
        }
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.id)
            .collect()
    }
}

#[async_trait]
impl RecordBackend for InMemoryBackend {
    async fn list(&self) -> Result<Vec<LocationRecord>, PersistenceError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn save(&self, form: &SaveUploadForm) -> Result<LocationRecord, PersistenceError> {
        let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut record = LocationRecord {
            id: Some(id),
            building_name: form.building_name.clone(),
            address: form.address.clone(),
            city: form.city.clone(),
            state: form.state.clone(),
            zip_code: form.zip_code.clone(),
            processed_image: Some(form.processed_image.clone()),
            ..LocationRecord::default()
        };
        record.set_rtu_count(form.rtu_count);

        let mut stored = record.clone();
        stored.coordinates = form.coordinates;
        self.records.lock().unwrap().push(stored);
        Ok(record)
    }

    async fn delete(&self, id: RecordId) -> Result<(), PersistenceError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != Some(id));
        if records.len() == before {
            return Err(PersistenceError::NotFound {
                what: format!("record {id}"),
            });
        }
        Ok(())
    }

    async fn approve(&self, id: RecordId) -> Result<ApprovalResponse, PersistenceError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == Some(id))
            .ok_or_else(|| PersistenceError::NotFound {
                what: format!("record {id}"),
            })?;
        record.approved = true;
        Ok(ApprovalResponse {
            id: id.0,
            approved: true,
            message: "Upload approved successfully".to_string(),
        })
    }
}

/// Geocoder that resolves every forward query to `location`, or to
/// nothing when `None`.
pub struct FixedGeocoder {
    pub location: Option<Coordinates>,
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn reverse(&self, _coords: Coordinates) -> Result<Option<GeocodedPlace>, GeocodeError> {
        Ok(None)
    }

    async fn forward(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        Ok(self.location.map(|location| GeocodedPlace {
            formatted_address: query.to_string(),
            city: String::new(),
            state: String::new(),
            zip: String::new(),
            place_id: String::new(),
            types: Vec::new(),
            location: Some(location),
        }))
    }
}

/// Geocoder that resolves every forward query to `center()` after a short
/// delay and records the highest number of overlapping calls.
#[derive(Default)]
pub struct CountingGeocoder {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingGeocoder {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn reverse(&self, _coords: Coordinates) -> Result<Option<GeocodedPlace>, GeocodeError> {
        Ok(None)
    }

    async fn forward(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        FixedGeocoder {
            location: Some(center()),
        }
        .forward(query)
        .await
    }
}
