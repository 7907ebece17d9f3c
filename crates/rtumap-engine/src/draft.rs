//! Draft State Machine.
//!
//! A draft is the location being annotated before it has a record id.
//! All transitions go through `&self` methods that take a short-lived lock,
//! so a draft can be shared with the detection run it is driving.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtumap_backend::PersistenceError;
use rtumap_core::{Coordinates, DetectionResult, LocationRecord};
use rtumap_geocode::GeocodedPlace;
use uuid::Uuid;

use crate::error::{EngineError, PipelineFailure, PipelineStep};
use crate::pipeline::{DetectionPipeline, StageObserver};
use crate::surface::MapSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftStatus {
    Idle,
    Capturing,
    Detecting,
    Ready,
    Saving,
    Saved,
    Failed,
}

impl DraftStatus {
    /// `true` while a detection run is in flight.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, DraftStatus::Capturing | DraftStatus::Detecting)
    }

    /// `true` when field edits are accepted.
    #[must_use]
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            DraftStatus::Idle | DraftStatus::Ready | DraftStatus::Failed
        )
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DraftStatus::Idle => "idle",
            DraftStatus::Capturing => "capturing",
            DraftStatus::Detecting => "detecting",
            DraftStatus::Ready => "ready",
            DraftStatus::Saving => "saving",
            DraftStatus::Saved => "saved",
            DraftStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A user-editable, mandatory-for-save field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    BuildingName,
    Address,
    City,
    State,
    ZipCode,
}

impl DraftField {
    pub const ALL: [DraftField; 5] = [
        DraftField::BuildingName,
        DraftField::Address,
        DraftField::City,
        DraftField::State,
        DraftField::ZipCode,
    ];

    /// Form field name as the backend expects it.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DraftField::BuildingName => "building_name",
            DraftField::Address => "address",
            DraftField::City => "city",
            DraftField::State => "state",
            DraftField::ZipCode => "zip_code",
        }
    }
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DraftField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DraftField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| format!("unknown draft field '{s}'"))
    }
}

/// The user-visible fields of a draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftFields {
    pub building_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub coordinates: Option<Coordinates>,
    pub place_id: Option<String>,
}

impl DraftFields {
    #[must_use]
    pub fn get(&self, field: DraftField) -> &str {
        match field {
            DraftField::BuildingName => &self.building_name,
            DraftField::Address => &self.address,
            DraftField::City => &self.city,
            DraftField::State => &self.state,
            DraftField::ZipCode => &self.zip_code,
        }
    }

    fn slot(&mut self, field: DraftField) -> &mut String {
        match field {
            DraftField::BuildingName => &mut self.building_name,
            DraftField::Address => &mut self.address,
            DraftField::City => &mut self.city,
            DraftField::State => &mut self.state,
            DraftField::ZipCode => &mut self.zip_code,
        }
    }

    /// Mandatory fields that are blank, in form order.
    #[must_use]
    pub fn missing(&self) -> Vec<DraftField> {
        DraftField::ALL
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect()
    }

    fn apply_place(&mut self, place: &GeocodedPlace) {
        self.address.clone_from(&place.formatted_address);
        self.city.clone_from(&place.city);
        self.state.clone_from(&place.state);
        self.zip_code.clone_from(&place.zip);
        if !place.place_id.is_empty() {
            self.place_id = Some(place.place_id.clone());
        }
    }
}

struct DraftState {
    status: DraftStatus,
    fields: DraftFields,
    result: Option<DetectionResult>,
    failure: Option<Arc<PipelineFailure>>,
}

/// In-progress location annotation.
pub struct Draft {
    id: Uuid,
    state: Mutex<DraftState>,
}

impl Default for Draft {
    fn default() -> Self {
        Self::new()
    }
}

impl Draft {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(DraftState {
                status: DraftStatus::Idle,
                fields: DraftFields::default(),
                result: None,
                failure: None,
            }),
        }
    }

    /// Local identifier used in logs; unrelated to the eventual record id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, DraftState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn status(&self) -> DraftStatus {
        self.lock().status
    }

    #[must_use]
    pub fn fields(&self) -> DraftFields {
        self.lock().fields.clone()
    }

    #[must_use]
    pub fn result(&self) -> Option<DetectionResult> {
        self.lock().result.clone()
    }

    /// The failure that put the draft in [`DraftStatus::Failed`], if any.
    #[must_use]
    pub fn last_failure(&self) -> Option<Arc<PipelineFailure>> {
        self.lock().failure.clone()
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] unless the draft is idle, ready or
    /// failed.
    pub fn set_field(&self, field: DraftField, value: &str) -> Result<(), EngineError> {
        let mut state = self.editable("edit fields")?;
        *state.fields.slot(field) = value.trim().to_string();
        Ok(())
    }

    /// Moves the draft to a new position.
    ///
    /// # Errors
    ///
    /// Same as [`Draft::set_field`].
    pub fn set_coordinates(&self, coordinates: Coordinates) -> Result<(), EngineError> {
        let mut state = self.editable("move")?;
        state.fields.coordinates = Some(coordinates);
        Ok(())
    }

    /// Fills address, city, state and zip code from a geocoded place.
    ///
    /// # Errors
    ///
    /// Same as [`Draft::set_field`].
    pub fn apply_place(&self, place: &GeocodedPlace) -> Result<(), EngineError> {
        let mut state = self.editable("apply a geocoded address")?;
        state.fields.apply_place(place);
        Ok(())
    }

    fn editable(&self, action: &'static str) -> Result<MutexGuard<'_, DraftState>, EngineError> {
        let state = self.lock();
        if state.status.is_editable() {
            Ok(state)
        } else {
            Err(EngineError::InvalidTransition {
                from: state.status,
                action,
            })
        }
    }

    /// Runs detection for `center` and stores the outcome on the draft.
    ///
    /// A geocoded address replaces the address fields; the building name is
    /// left as the user typed it.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ConcurrentOperation`] if a run is already in flight;
    ///   the in-flight status is left untouched.
    /// - [`EngineError::InvalidTransition`] while saving or once saved.
    /// - [`EngineError::Pipeline`] if the run failed; the draft is then
    ///   [`DraftStatus::Failed`] with the same failure attached.
    pub async fn detect(
        &self,
        pipeline: &DetectionPipeline,
        surface: &dyn MapSurface,
        center: Coordinates,
    ) -> Result<DetectionResult, EngineError> {
        {
            let mut state = self.lock();
            match state.status {
                DraftStatus::Capturing | DraftStatus::Detecting => {
                    return Err(EngineError::ConcurrentOperation);
                }
                DraftStatus::Saving | DraftStatus::Saved => {
                    return Err(EngineError::InvalidTransition {
                        from: state.status,
                        action: "detect",
                    });
                }
                DraftStatus::Idle | DraftStatus::Ready | DraftStatus::Failed => {}
            }
            state.status = DraftStatus::Capturing;
            state.fields.coordinates = Some(center);
            state.result = None;
            state.failure = None;
        }
        tracing::debug!(draft = %self.id, %center, "detection started");

        let outcome = pipeline.run(surface, center, self).await;

        let mut state = self.lock();
        match outcome {
            Ok(output) => {
                if let Some(place) = &output.place {
                    state.fields.apply_place(place);
                }
                state.result = Some(output.result.clone());
                state.status = DraftStatus::Ready;
                Ok(output.result)
            }
            Err(failure) => {
                let failure = Arc::new(failure);
                state.failure = Some(Arc::clone(&failure));
                state.status = DraftStatus::Failed;
                Err(EngineError::Pipeline(failure))
            }
        }
    }

    /// Validates the draft and moves it to [`DraftStatus::Saving`].
    ///
    /// Accepted from `Ready`, or from `Failed` when a detection result is
    /// still held (a failed save). Returns the record to persist.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] listing every blank mandatory field;
    ///   the status is unchanged.
    /// - [`EngineError::InvalidTransition`] from any other status.
    pub fn begin_save(&self) -> Result<LocationRecord, EngineError> {
        let mut state = self.lock();
        let result = match (state.status, &state.result) {
            (DraftStatus::Ready | DraftStatus::Failed, Some(result)) => result.clone(),
            (from, _) => {
                return Err(EngineError::InvalidTransition {
                    from,
                    action: "save",
                })
            }
        };

        let missing = state.fields.missing();
        if !missing.is_empty() {
            return Err(EngineError::Validation { missing });
        }

        state.status = DraftStatus::Saving;
        let fields = &state.fields;
        Ok(LocationRecord {
            building_name: fields.building_name.clone(),
            address: fields.address.clone(),
            city: fields.city.clone(),
            state: fields.state.clone(),
            zip_code: fields.zip_code.clone(),
            coordinates: fields.coordinates,
            rtu_count: result.rtu_count,
            lead_score: result.lead_score,
            processed_image: result.processed_image,
            ..LocationRecord::default()
        })
    }

    /// Completes a save started by [`Draft::begin_save`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidTransition`] unless the draft is saving.
    /// - [`EngineError::Pipeline`] carrying the persistence error; the draft
    ///   is then `Failed` and keeps its detection result.
    pub fn finish_save(
        &self,
        outcome: Result<LocationRecord, PersistenceError>,
    ) -> Result<LocationRecord, EngineError> {
        let mut state = self.lock();
        if state.status != DraftStatus::Saving {
            return Err(EngineError::InvalidTransition {
                from: state.status,
                action: "finish saving",
            });
        }

        match outcome {
            Ok(record) => {
                state.status = DraftStatus::Saved;
                tracing::debug!(draft = %self.id, id = ?record.id, "draft saved");
                Ok(record)
            }
            Err(e) => {
                let failure = Arc::new(PipelineFailure::new(PipelineStep::Persist, e));
                state.failure = Some(Arc::clone(&failure));
                state.status = DraftStatus::Failed;
                Err(EngineError::Pipeline(failure))
            }
        }
    }
}

impl StageObserver for Draft {
    fn on_step(&self, step: PipelineStep) {
        let mut state = self.lock();
        if step == PipelineStep::Detect && state.status == DraftStatus::Capturing {
            state.status = DraftStatus::Detecting;
        }
    }
}

#[cfg(test)]
#[path = "draft_test.rs"]
mod tests;
