//! Viewport controller - the public pan/zoom API
//!
//! Used both by host-level UI controls (zoom buttons, drag handlers) and by
//! the settle sequencer. All operations are synchronous, pass through the
//! clamping in [`crate::viewport`], and become silent no-ops while the
//! container or artifact has no measurable geometry (transient zero-size
//! frames are expected during initial layout).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::surface::DisplaySurface;
use crate::viewport::{clamp_scale, Size, ViewportState, ViewportTransform};

/// Handle for viewport manipulation.
///
/// Cheap to clone; clones share the same viewport state and surface.
#[derive(Clone)]
pub struct ViewportController {
    state: Arc<Mutex<ViewportState>>,
    surface: Arc<dyn DisplaySurface>,
}

impl ViewportController {
    pub fn new(state: Arc<Mutex<ViewportState>>, surface: Arc<dyn DisplaySurface>) -> Self {
        Self { state, surface }
    }

    /// Current transform. Always available, even before the first render.
    pub fn transform(&self) -> ViewportTransform {
        self.state.lock().transform()
    }

    /// Zoom in by one step, keeping the container center on the same content
    /// point.
    pub fn zoom_in(&self) {
        let step = self.state.lock().limits().zoom_step;
        self.zoom_by(step);
    }

    /// Zoom out by one step, keeping the container center on the same content
    /// point.
    pub fn zoom_out(&self) {
        let step = self.state.lock().limits().zoom_step;
        self.zoom_by(1.0 / step);
    }

    /// Zoom by an arbitrary factor anchored at the container center.
    pub fn zoom_by(&self, factor: f32) {
        let Some((container, _)) = self.geometry() else {
            return;
        };
        self.zoom_at(container.width / 2.0, container.height / 2.0, factor);
    }

    /// Zoom by `factor` keeping the content point under `(px, py)` (container
    /// pixels) fixed.
    pub fn zoom_at(&self, px: f32, py: f32, factor: f32) {
        let Some((container, content)) = self.geometry() else {
            return;
        };
        let mut state = self.state.lock();
        let t = state.transform();
        let scale = clamp_scale(state.limits(), t.scale * factor);
        if scale == t.scale {
            return;
        }
        // screen = position + scale * content_point; solve for the position
        // that maps the anchored content point back to (px, py).
        let ratio = scale / t.scale;
        let x = px - (px - t.x) * ratio;
        let y = py - (py - t.y) * ratio;
        state.apply(x, y, scale, container, content);
    }

    /// Pan by a delta in container pixels.
    pub fn pan_by(&self, dx: f32, dy: f32) {
        let Some((container, content)) = self.geometry() else {
            return;
        };
        let mut state = self.state.lock();
        let t = state.transform();
        state.apply(t.x + dx, t.y + dy, t.scale, container, content);
    }

    /// Center the artifact's bounding box within the container at
    /// `target_scale` (clamped).
    pub fn center(&self, target_scale: f32) {
        let Some((container, content)) = self.geometry() else {
            log::debug!("center skipped: geometry unavailable");
            return;
        };
        let mut state = self.state.lock();
        let scale = clamp_scale(state.limits(), target_scale);
        let x = (container.width - content.width * scale) / 2.0;
        let y = (container.height - content.height * scale) / 2.0;
        state.apply(x, y, scale, container, content);
    }

    /// Restore the neutral transform. Idempotent.
    pub fn reset(&self) {
        if self.geometry().is_none() {
            return;
        }
        self.state.lock().reset();
    }

    /// Low-level setter used by the settle sequencer; always clamped.
    pub fn set_transform(&self, x: f32, y: f32, scale: f32) {
        let Some((container, content)) = self.geometry() else {
            return;
        };
        self.state.lock().apply(x, y, scale, container, content);
    }

    fn geometry(&self) -> Option<(Size, Size)> {
        let container = self.surface.container_size();
        let content = self.surface.content_size();
        if container.is_empty() || content.is_empty() {
            None
        } else {
            Some((container, content))
        }
    }
}
