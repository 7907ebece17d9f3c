//! Event-driven session tying the map surface, the current draft and the
//! record store together.
//!
//! Hosts translate surface callbacks (clicks, drags, place search) and user
//! commands into [`MapEvent`] values and hand them to
//! [`MapSession::handle`]; the session decides which transition applies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rtumap_core::{Coordinates, DetectionResult, LocationRecord, RecordId};
use rtumap_geocode::GeocodedPlace;

use crate::capture::CapturePipeline;
use crate::draft::{Draft, DraftField};
use crate::error::EngineError;
use crate::markers::{MarkerKey, MarkerRegistry};
use crate::pipeline::DetectionPipeline;
use crate::services::{DetectionService, Geocoder, RecordBackend};
use crate::store::RecordStoreSync;
use crate::surface::{InfoWindowContent, MapSurface, SurfaceMarkerId, Viewport};

/// Zoom applied when a searched place is selected.
pub const PLACE_SELECTED_ZOOM: u8 = 15;

const UNKNOWN_BUILDING: &str = "Unknown Building";

#[derive(Debug, Clone)]
pub enum MapEvent {
    /// The map background was clicked.
    MapClicked(Coordinates),
    /// The placement marker was dragged to a new position.
    MarkerDragEnded(Coordinates),
    MarkerClicked(SurfaceMarkerId),
    /// A place-search result was picked.
    PlaceSelected {
        name: Option<String>,
        address: String,
        location: Coordinates,
    },
    DetectRequested,
    FieldEdited { field: DraftField, value: String },
    SaveRequested,
    DeleteRequested(RecordId),
}

/// What an event changed.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The placement marker moved; `place` is the reverse-geocoded address
    /// when one was found.
    PlacementMoved {
        position: Coordinates,
        place: Option<GeocodedPlace>,
    },
    InfoWindowOpened(MarkerKey),
    ViewportChanged(Viewport),
    DetectionReady(DetectionResult),
    FieldUpdated(DraftField),
    Saved(LocationRecord),
    Deleted(RecordId),
    /// The event referred to something that no longer exists.
    Ignored,
}

pub struct MapSession {
    surface: Arc<dyn MapSurface>,
    geocoder: Arc<dyn Geocoder>,
    pipeline: DetectionPipeline,
    registry: Arc<MarkerRegistry>,
    store: RecordStoreSync,
    draft: Mutex<Arc<Draft>>,
    records_loaded: AtomicBool,
}

impl MapSession {
    pub fn new(
        surface: Arc<dyn MapSurface>,
        geocoder: Arc<dyn Geocoder>,
        detector: Arc<dyn DetectionService>,
        backend: Arc<dyn RecordBackend>,
        capture: CapturePipeline,
    ) -> Self {
        let registry = Arc::new(MarkerRegistry::new(Arc::clone(&surface)));
        let store = RecordStoreSync::new(backend, Arc::clone(&geocoder), Arc::clone(&registry));
        let pipeline = DetectionPipeline::new(Arc::clone(&geocoder), detector, capture);
        Self {
            surface,
            geocoder,
            pipeline,
            registry,
            store,
            draft: Mutex::new(Arc::new(Draft::new())),
            records_loaded: AtomicBool::new(false),
        }
    }

    /// Caps concurrent address repairs when records are loaded.
    #[must_use]
    pub fn with_repair_concurrency(mut self, max_concurrent: usize) -> Self {
        self.store = self.store.with_repair_concurrency(max_concurrent);
        self
    }

    /// The draft currently being annotated.
    #[must_use]
    pub fn draft(&self) -> Arc<Draft> {
        Arc::clone(&self.draft.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn store(&self) -> &RecordStoreSync {
        &self.store
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<MarkerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn records_loaded(&self) -> bool {
        self.records_loaded.load(Ordering::Acquire)
    }

    /// Loads every record and draws its marker.
    ///
    /// # Errors
    ///
    /// [`EngineError::Persistence`] if the listing fails.
    pub async fn load(&self) -> Result<Vec<LocationRecord>, EngineError> {
        let records = self.store.refresh().await?;
        self.records_loaded.store(true, Ordering::Release);
        Ok(records)
    }

    /// Approves a record and re-icons its marker.
    ///
    /// # Errors
    ///
    /// [`EngineError::Persistence`] if the backend rejects the approval.
    pub async fn approve(&self, id: RecordId) -> Result<Option<LocationRecord>, EngineError> {
        Ok(self.store.approve(id).await?)
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Whatever the transition raises: validation, concurrency, invalid
    /// transition, pipeline or persistence errors.
    pub async fn handle(&self, event: MapEvent) -> Result<SessionUpdate, EngineError> {
        match event {
            MapEvent::MapClicked(position) | MapEvent::MarkerDragEnded(position) => {
                self.move_placement(position).await
            }
            MapEvent::MarkerClicked(surface_id) => Ok(self.open_marker(surface_id)),
            MapEvent::PlaceSelected {
                name,
                address,
                location,
            } => self.select_place(name, &address, location),
            MapEvent::DetectRequested => {
                let center = self.surface.viewport().center;
                let draft = self.draft();
                let result = draft
                    .detect(&self.pipeline, self.surface.as_ref(), center)
                    .await?;
                Ok(SessionUpdate::DetectionReady(result))
            }
            MapEvent::FieldEdited { field, value } => {
                self.draft().set_field(field, &value)?;
                Ok(SessionUpdate::FieldUpdated(field))
            }
            MapEvent::SaveRequested => self.save().await,
            MapEvent::DeleteRequested(id) => {
                self.store.delete(id).await?;
                Ok(SessionUpdate::Deleted(id))
            }
        }
    }

    /// Moves the placement marker and reverse-geocodes its new position.
    ///
    /// A geocoding failure is logged; the marker still moves and its info
    /// window shows the coordinates without an address.
    async fn move_placement(&self, position: Coordinates) -> Result<SessionUpdate, EngineError> {
        let draft = self.draft();
        draft.set_coordinates(position)?;
        self.registry.place(position);

        let place = match self.geocoder.reverse(position).await {
            Ok(place) => place,
            Err(e) => {
                tracing::warn!(%position, error = %e, "reverse geocode of placement failed");
                None
            }
        };

        if let Some(place) = &place {
            if let Err(e) = draft.apply_place(place) {
                tracing::debug!(error = %e, "draft changed while geocoding; address not applied");
            }
        }
        let address = place
            .as_ref()
            .map(|p| p.formatted_address.as_str())
            .unwrap_or_default();
        self.registry
            .open_placement_info(&InfoWindowContent::for_placement(address, position));

        Ok(SessionUpdate::PlacementMoved { position, place })
    }

    /// Opens the info window for a clicked marker using the store's current
    /// copy of the record.
    fn open_marker(&self, surface_id: SurfaceMarkerId) -> SessionUpdate {
        match self.registry.key_of(surface_id) {
            Some(MarkerKey::Record(id)) => match self.store.get(id) {
                Some(record) if self.registry.open_info(&record) => {
                    SessionUpdate::InfoWindowOpened(MarkerKey::Record(id))
                }
                _ => SessionUpdate::Ignored,
            },
            Some(MarkerKey::Placement) => {
                let fields = self.draft().fields();
                let Some(position) = fields.coordinates else {
                    return SessionUpdate::Ignored;
                };
                let content = InfoWindowContent::for_placement(&fields.address, position);
                if self.registry.open_placement_info(&content) {
                    SessionUpdate::InfoWindowOpened(MarkerKey::Placement)
                } else {
                    SessionUpdate::Ignored
                }
            }
            None => SessionUpdate::Ignored,
        }
    }

    fn select_place(
        &self,
        name: Option<String>,
        address: &str,
        location: Coordinates,
    ) -> Result<SessionUpdate, EngineError> {
        let draft = self.draft();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_BUILDING.to_string());
        draft.set_field(DraftField::BuildingName, &name)?;
        draft.set_field(DraftField::Address, address)?;
        draft.set_coordinates(location)?;

        let viewport = Viewport {
            center: location,
            zoom: PLACE_SELECTED_ZOOM,
        };
        self.surface.set_viewport(viewport);
        self.registry.place(location);
        Ok(SessionUpdate::ViewportChanged(viewport))
    }

    /// Saves the current draft; on success the placement marker is dropped
    /// and a fresh draft takes its place.
    async fn save(&self) -> Result<SessionUpdate, EngineError> {
        let draft = self.draft();
        let record = draft.begin_save()?;
        let outcome = self.store.create(record).await;
        let saved = draft.finish_save(outcome)?;

        self.registry.clear_placement();
        let mut current = self.draft.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::ptr_eq(&current, &draft) {
            *current = Arc::new(Draft::new());
        }
        Ok(SessionUpdate::Saved(saved))
    }
}
