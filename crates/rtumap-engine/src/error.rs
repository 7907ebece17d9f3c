use std::sync::Arc;

use rtumap_backend::{DetectionError, FieldError, PersistenceError};
use rtumap_geocode::GeocodeError;
use thiserror::Error;

use crate::draft::{DraftField, DraftStatus};

/// Errors from rendering the viewport into a submittable image.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("map surface is detached")]
    Detached,

    #[error("viewport render failed: {reason}")]
    Render { reason: String },

    #[error("rendered frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    /// Pixel buffer length does not match the reported dimensions.
    #[error("rendered frame has {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    InconsistentFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Step of a detection run, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Geocode,
    Capture,
    Detect,
    Persist,
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStep::Geocode => "geocode",
            PipelineStep::Capture => "capture",
            PipelineStep::Detect => "detect",
            PipelineStep::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// A pipeline error together with the step that raised it.
#[derive(Debug, Error)]
#[error("{step} step failed: {error}")]
pub struct PipelineFailure {
    pub step: PipelineStep,
    #[source]
    pub error: PipelineError,
}

impl PipelineFailure {
    pub fn new(step: PipelineStep, error: impl Into<PipelineError>) -> Self {
        Self {
            step,
            error: error.into(),
        }
    }
}

/// Errors surfaced to callers of the draft, store and session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing required fields: {}", format_missing(.missing))]
    Validation { missing: Vec<DraftField> },

    #[error("a detection run is already in flight for this draft")]
    ConcurrentOperation,

    #[error("cannot {action} while the draft is {from}")]
    InvalidTransition {
        from: DraftStatus,
        action: &'static str,
    },

    /// A detection run failed; the same failure is recorded on the draft.
    #[error(transparent)]
    Pipeline(Arc<PipelineFailure>),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Provider(#[from] GeocodeError),
}

impl EngineError {
    /// Per-field backend validation failures, whether returned directly or
    /// recorded as a failed save.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            EngineError::Persistence(e) => e.field_errors(),
            EngineError::Pipeline(failure) => match &failure.error {
                PipelineError::Persistence(e) => e.field_errors(),
                _ => &[],
            },
            _ => &[],
        }
    }
}

fn format_missing(missing: &[DraftField]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
