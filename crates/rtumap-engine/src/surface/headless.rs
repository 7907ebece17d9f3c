use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rtumap_core::Coordinates;

use super::{
    InfoWindowContent, MapSurface, MarkerSpec, RenderedFrame, SurfaceMarkerId, Viewport,
};
use crate::error::CaptureError;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const BACKGROUND: Rgba<u8> = Rgba([245, 245, 245, 255]);
const TILE_SIZE: f64 = 256.0;
/// Half-width of a drawn marker, in CSS pixels.
const MARKER_RADIUS: f64 = 4.0;

struct SurfaceState {
    attached: bool,
    next_id: u64,
    markers: BTreeMap<SurfaceMarkerId, MarkerSpec>,
    info_window: Option<(SurfaceMarkerId, InfoWindowContent)>,
    viewport: Viewport,
}

/// In-memory map surface.
///
/// Keeps a marker table and renders the viewport by scaling an optional
/// backdrop image (for example a saved aerial tile) and drawing markers on
/// top with a Web Mercator projection. Used by the CLI and by tests.
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    backdrop: Option<RgbaImage>,
    state: Mutex<SurfaceState>,
}

impl HeadlessSurface {
    /// A blank 640x480 surface.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self::with_size(viewport, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    #[must_use]
    pub fn with_size(viewport: Viewport, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            backdrop: None,
            state: Mutex::new(SurfaceState {
                attached: true,
                next_id: 1,
                markers: BTreeMap::new(),
                info_window: None,
                viewport,
            }),
        }
    }

    /// A surface sized to `backdrop`, which is drawn underneath markers.
    #[must_use]
    pub fn with_backdrop(viewport: Viewport, backdrop: RgbaImage) -> Self {
        let mut surface = Self::with_size(viewport, backdrop.width(), backdrop.height());
        surface.backdrop = Some(backdrop);
        surface
    }

    /// Tears the surface down; later renders fail with
    /// [`CaptureError::Detached`].
    pub fn detach(&self) {
        self.lock().attached = false;
    }

    #[must_use]
    pub fn markers(&self) -> Vec<(SurfaceMarkerId, MarkerSpec)> {
        self.lock()
            .markers
            .iter()
            .map(|(id, spec)| (*id, spec.clone()))
            .collect()
    }

    #[must_use]
    pub fn marker(&self, id: SurfaceMarkerId) -> Option<MarkerSpec> {
        self.lock().markers.get(&id).cloned()
    }

    /// The currently open info window, if any.
    #[must_use]
    pub fn info_window(&self) -> Option<(SurfaceMarkerId, InfoWindowContent)> {
        self.lock().info_window.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MapSurface for HeadlessSurface {
    fn is_attached(&self) -> bool {
        self.lock().attached
    }

    fn create_marker(&self, spec: &MarkerSpec) -> SurfaceMarkerId {
        let mut state = self.lock();
        let id = SurfaceMarkerId(state.next_id);
        state.next_id += 1;
        state.markers.insert(id, spec.clone());
        id
    }

    fn update_marker(&self, id: SurfaceMarkerId, spec: &MarkerSpec) {
        if let Some(existing) = self.lock().markers.get_mut(&id) {
            *existing = spec.clone();
        }
    }

    fn remove_marker(&self, id: SurfaceMarkerId) {
        let mut state = self.lock();
        state.markers.remove(&id);
        if state.info_window.as_ref().is_some_and(|(anchor, _)| *anchor == id) {
            state.info_window = None;
        }
    }

    fn open_info_window(&self, anchor: SurfaceMarkerId, content: &InfoWindowContent) {
        let mut state = self.lock();
        if state.markers.contains_key(&anchor) {
            state.info_window = Some((anchor, content.clone()));
        }
    }

    fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.lock().viewport = viewport;
    }

    async fn render_viewport(&self, scale: f32) -> Result<RenderedFrame, CaptureError> {
        let (viewport, markers) = {
            let state = self.lock();
            if !state.attached {
                return Err(CaptureError::Detached);
            }
            let markers: Vec<MarkerSpec> = state.markers.values().cloned().collect();
            (state.viewport, markers)
        };

        if !scale.is_finite() || scale <= 0.0 {
            return Err(CaptureError::Render {
                reason: format!("invalid scale {scale}"),
            });
        }

        let scale = f64::from(scale);
        let width = scaled(self.width, scale);
        let height = scaled(self.height, scale);
        if width == 0 || height == 0 {
            return Ok(RenderedFrame {
                width,
                height,
                rgba: Vec::new(),
            });
        }

        let mut canvas = match &self.backdrop {
            Some(backdrop) => imageops::resize(backdrop, width, height, FilterType::Triangle),
            None => RgbaImage::from_pixel(width, height, BACKGROUND),
        };

        let origin = world_pixel(viewport.center, viewport.zoom);
        for spec in &markers {
            let (wx, wy) = world_pixel(spec.position, viewport.zoom);
            let px = (wx - origin.0) * scale + f64::from(width) / 2.0;
            let py = (wy - origin.1) * scale + f64::from(height) / 2.0;
            draw_dot(&mut canvas, px, py, MARKER_RADIUS * scale, Rgba(spec.icon.rgba()));
        }

        Ok(RenderedFrame {
            width,
            height,
            rgba: canvas.into_raw(),
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(css_pixels: u32, scale: f64) -> u32 {
    (f64::from(css_pixels) * scale).round().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Web Mercator world coordinates at `zoom`, in CSS pixels.
fn world_pixel(position: Coordinates, zoom: u8) -> (f64, f64) {
    let size = TILE_SIZE * 2f64.powi(i32::from(zoom));
    let x = (position.lng() + 180.0) / 360.0 * size;
    let sin = position.lat().to_radians().sin().clamp(-0.9999, 0.9999);
    let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * size;
    (x, y)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn draw_dot(canvas: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    let max_x = f64::from(canvas.width()) - 1.0;
    let max_y = f64::from(canvas.height()) - 1.0;
    let x0 = (cx - radius).floor();
    let x1 = (cx + radius).ceil();
    let y0 = (cy - radius).floor();
    let y1 = (cy + radius).ceil();
    if x1 < 0.0 || y1 < 0.0 || x0 > max_x || y0 > max_y {
        return;
    }

    let (x0, x1) = (x0.max(0.0) as u32, x1.min(max_x) as u32);
    let (y0, y1) = (y0.max(0.0) as u32, y1.min(max_y) as u32);
    for y in y0..=y1 {
        for x in x0..=x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}
