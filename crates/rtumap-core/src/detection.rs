use serde::{Deserialize, Serialize};

use crate::lead_score::LeadScore;

/// Score the detection service is assumed to report when it omits one,
/// on its own 0–1 scale.
pub const PROVIDER_NEUTRAL_SCORE: f64 = 0.5;

/// One detected rooftop unit, positioned in image-pixel coordinates of the
/// submitted capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub class_name: Option<String>,
}

/// Binary image ready to be submitted to the detection service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Normalized outcome of one detection request.
///
/// Never persisted on its own; it is folded into a
/// [`LocationRecord`](crate::LocationRecord) when the draft is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub rtu_count: u32,
    pub detections: Vec<Detection>,
    pub processed_image: Option<String>,
    /// Derived from `rtu_count`.
    pub lead_score: LeadScore,
    /// Service-reported score on its 0–1 scale, or [`PROVIDER_NEUTRAL_SCORE`].
    pub provider_score: f64,
}

impl DetectionResult {
    #[must_use]
    pub fn new(
        rtu_count: u32,
        detections: Vec<Detection>,
        processed_image: Option<String>,
        provider_score: Option<f64>,
    ) -> Self {
        Self {
            rtu_count,
            detections,
            processed_image,
            lead_score: LeadScore::from_rtu_count(rtu_count),
            provider_score: provider_score
                .filter(|s| s.is_finite())
                .unwrap_or(PROVIDER_NEUTRAL_SCORE),
        }
    }

    /// Mean confidence across detections, `None` when nothing was detected.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.detections.is_empty() {
            return None;
        }
        let sum: f64 = self.detections.iter().map(|d| d.confidence).sum();
        Some(sum / self.detections.len() as f64)
    }
}
