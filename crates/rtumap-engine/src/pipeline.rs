//! Detection Pipeline: geocode → capture → detect → normalize.
//!
//! Steps run strictly in sequence. A reverse-geocode failure is logged and
//! the run continues with a blank address; capture and detection failures
//! end the run and are attributed to their step. Nothing is retried.

use std::sync::Arc;

use rtumap_core::{Coordinates, DetectionResult};
use rtumap_geocode::GeocodedPlace;
use uuid::Uuid;

use crate::capture::{to_submittable_payload, CapturePipeline};
use crate::error::{PipelineFailure, PipelineStep};
use crate::services::{DetectionService, Geocoder};
use crate::surface::MapSurface;

/// Notified as a run enters each step.
pub trait StageObserver: Send + Sync {
    fn on_step(&self, step: PipelineStep);
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn on_step(&self, _step: PipelineStep) {}
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result: DetectionResult,
    /// Reverse-geocoded center; `None` when the provider found nothing or
    /// the lookup failed.
    pub place: Option<GeocodedPlace>,
    pub center: Coordinates,
}

pub struct DetectionPipeline {
    geocoder: Arc<dyn Geocoder>,
    detector: Arc<dyn DetectionService>,
    capture: CapturePipeline,
}

impl DetectionPipeline {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        detector: Arc<dyn DetectionService>,
        capture: CapturePipeline,
    ) -> Self {
        Self {
            geocoder,
            detector,
            capture,
        }
    }

    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] attributed to
    /// [`PipelineStep::Capture`] or [`PipelineStep::Detect`].
    pub async fn run(
        &self,
        surface: &dyn MapSurface,
        center: Coordinates,
        observer: &dyn StageObserver,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let run_id = Uuid::new_v4();

        observer.on_step(PipelineStep::Geocode);
        let place = match self.geocoder.reverse(center).await {
            Ok(place) => place,
            Err(e) => {
                tracing::warn!(%run_id, %center, error = %e, "reverse geocode failed; continuing without address");
                None
            }
        };
        let address = place
            .as_ref()
            .map(|p| p.formatted_address.as_str())
            .unwrap_or_default();

        observer.on_step(PipelineStep::Capture);
        let image = self
            .capture
            .capture_viewport(surface)
            .await
            .map_err(|e| {
                tracing::warn!(%run_id, error = %e, "viewport capture failed");
                PipelineFailure::new(PipelineStep::Capture, e)
            })?;
        let payload = to_submittable_payload(&image);

        observer.on_step(PipelineStep::Detect);
        let result = self
            .detector
            .detect(&payload, center, address)
            .await
            .map_err(|e| {
                tracing::warn!(%run_id, error = %e, "detection request failed");
                PipelineFailure::new(PipelineStep::Detect, e)
            })?;

        tracing::info!(
            %run_id,
            %center,
            rtu_count = result.rtu_count,
            lead_score = %result.lead_score,
            "detection run complete"
        );

        Ok(PipelineOutput {
            result,
            place,
            center,
        })
    }
}
