//! Map annotation and detection orchestration.
//!
//! Keeps an externally-owned [`MapSurface`] in step with the backend's
//! records and sequences the geocode → capture → detect → persist pipeline
//! for the location currently being annotated.

pub mod capture;
pub mod draft;
pub mod error;
pub mod markers;
pub mod pipeline;
pub mod services;
pub mod session;
pub mod store;
pub mod surface;

pub use capture::{to_submittable_payload, CapturePipeline, RasterImage, MIN_CAPTURE_SCALE};
pub use draft::{Draft, DraftField, DraftFields, DraftStatus};
pub use error::{CaptureError, EngineError, PipelineError, PipelineFailure, PipelineStep};
pub use markers::{icon_for, MarkerHandle, MarkerKey, MarkerRegistry};
pub use pipeline::{DetectionPipeline, NoopObserver, PipelineOutput, StageObserver};
pub use services::{DetectionService, Geocoder, RecordBackend};
pub use session::{MapEvent, MapSession, SessionUpdate, PLACE_SELECTED_ZOOM};
pub use store::{RecordStoreSync, DEFAULT_REPAIR_CONCURRENCY};
pub use surface::{
    HeadlessSurface, InfoWindowContent, MapSurface, MarkerIcon, MarkerSpec, RenderedFrame,
    SurfaceMarkerId, Viewport,
};
