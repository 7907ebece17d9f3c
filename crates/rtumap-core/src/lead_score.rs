//! Lead score derivation.
//!
//! A lead score is a 0–15 integer derived from the number of detected
//! rooftop units. Every place that shows a score goes through
//! [`LeadScore::tier`], so the red/orange/green buckets stay consistent
//! between the detection dialog, the save form and the map markers.

use serde::{Deserialize, Serialize};

/// Upper bound of the lead score scale. Unit counts above it are clamped.
pub const MAX_LEAD_SCORE: u8 = 15;

/// Score on the 0–15 scale.
///
/// [`LeadScore::from_rtu_count`] never exceeds [`MAX_LEAD_SCORE`]; values
/// above it only appear when a stored raw value is read back through
/// [`LeadScore::from_raw`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LeadScore(u8);

/// Display bucket for a [`LeadScore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTier {
    /// No units detected.
    None,
    Bad,
    Fair,
    Good,
    /// Only reachable from reconstructed values above the clamp.
    Excellent,
}

impl LeadScore {
    /// Derives the score from a detected unit count, clamped to `[0, 15]`.
    #[must_use]
    pub fn from_rtu_count(rtu_count: u32) -> Self {
        let clamped = rtu_count.min(u32::from(MAX_LEAD_SCORE));
        Self(u8::try_from(clamped).unwrap_or(MAX_LEAD_SCORE))
    }

    /// Rebuilds a score from a raw stored value without clamping to 15.
    ///
    /// Negative values become 0; values beyond `u8::MAX` saturate.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        Self(u8::try_from(raw.max(0)).unwrap_or(u8::MAX))
    }

    /// Projects a provider score on the 0–1 scale onto the 0–15 scale.
    ///
    /// Non-finite input maps to the projection of the neutral 0.5 score (8).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_provider_score(score: f64) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            crate::PROVIDER_NEUTRAL_SCORE
        };
        Self((score * f64::from(MAX_LEAD_SCORE)).round() as u8)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn tier(self) -> LeadTier {
        match self.0 {
            0 => LeadTier::None,
            1..=5 => LeadTier::Bad,
            6..=10 => LeadTier::Fair,
            11..=15 => LeadTier::Good,
            _ => LeadTier::Excellent,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        self.tier().label()
    }
}

impl LeadTier {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            LeadTier::None => "N/A",
            LeadTier::Bad => "Bad",
            LeadTier::Fair => "Fair",
            LeadTier::Good => "Good",
            LeadTier::Excellent => "Excellent",
        }
    }
}

impl std::fmt::Display for LeadTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::fmt::Display for LeadScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}
