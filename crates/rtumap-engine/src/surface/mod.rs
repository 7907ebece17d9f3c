//! Capability interface of the externally-owned map surface.
//!
//! The engine never holds references into the map itself; it only keeps the
//! opaque [`SurfaceMarkerId`]s handed back by [`MapSurface::create_marker`],
//! and only the [`MarkerRegistry`](crate::MarkerRegistry) does that.

mod headless;

pub use headless::HeadlessSurface;

use async_trait::async_trait;
use rtumap_core::{Coordinates, LocationRecord};

use crate::error::CaptureError;

/// Opaque marker handle issued by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceMarkerId(pub u64);

impl std::fmt::Display for SurfaceMarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "marker-{}", self.0)
    }
}

/// Marker color, keyed off the lead score tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerIcon {
    Red,
    Orange,
    Green,
    /// The surface's own default pin.
    Default,
}

impl MarkerIcon {
    /// Icon image URL, `None` for the surface default.
    #[must_use]
    pub fn url(self) -> Option<&'static str> {
        match self {
            MarkerIcon::Red => Some("https://maps.google.com/mapfiles/ms/icons/red-dot.png"),
            MarkerIcon::Orange => Some("https://maps.google.com/mapfiles/ms/icons/orange-dot.png"),
            MarkerIcon::Green => Some("https://maps.google.com/mapfiles/ms/icons/green-dot.png"),
            MarkerIcon::Default => None,
        }
    }

    #[must_use]
    pub fn rgba(self) -> [u8; 4] {
        match self {
            MarkerIcon::Red => [220, 53, 69, 255],
            MarkerIcon::Orange => [253, 126, 20, 255],
            MarkerIcon::Green => [40, 167, 69, 255],
            MarkerIcon::Default => [66, 133, 244, 255],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: Coordinates,
    pub icon: MarkerIcon,
    pub title: String,
    pub draggable: bool,
}

/// Text shown in an info window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoWindowContent {
    pub heading: String,
    pub lines: Vec<String>,
}

impl InfoWindowContent {
    /// Summary of a persisted record.
    #[must_use]
    pub fn for_record(record: &LocationRecord) -> Self {
        Self {
            heading: record.display_name().to_string(),
            lines: vec![
                record.display_address().to_string(),
                format!("RTU Count: {}", record.rtu_count),
                format!("Lead Score: {}", record.lead_score.label()),
            ],
        }
    }

    /// Details of the placement marker: address and coordinates to six
    /// decimals.
    #[must_use]
    pub fn for_placement(address: &str, position: Coordinates) -> Self {
        let address = if address.trim().is_empty() {
            "Unknown Address"
        } else {
            address
        };
        Self {
            heading: "Location Details".to_string(),
            lines: vec![
                format!("Address: {address}"),
                format!("Coordinates: {position}"),
            ],
        }
    }
}

impl std::fmt::Display for InfoWindowContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.heading)?;
        for line in &self.lines {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coordinates,
    pub zoom: u8,
}

/// Raw RGBA8 pixels of a rendered viewport, row-major.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Operations the engine needs from a map surface.
///
/// Marker and viewport calls are synchronous and must not block; rendering
/// is the only suspension point.
#[async_trait]
pub trait MapSurface: Send + Sync {
    /// `false` once the surface has been torn down.
    fn is_attached(&self) -> bool;

    fn create_marker(&self, spec: &MarkerSpec) -> SurfaceMarkerId;

    /// Moves and restyles an existing marker in place.
    fn update_marker(&self, id: SurfaceMarkerId, spec: &MarkerSpec);

    fn remove_marker(&self, id: SurfaceMarkerId);

    fn open_info_window(&self, anchor: SurfaceMarkerId, content: &InfoWindowContent);

    fn viewport(&self) -> Viewport;

    fn set_viewport(&self, viewport: Viewport);

    /// Renders the current viewport at `scale` device pixels per CSS pixel.
    async fn render_viewport(&self, scale: f32) -> Result<RenderedFrame, CaptureError>;
}
