//! Viewport transform state and clamping arithmetic
//!
//! Plain data plus pure functions:
//! - Pan/zoom transform over the rendered artifact
//! - Scale clamping to a configurable `[min_scale, max_scale]` range
//! - Position clamping so the artifact can never be panned fully out of view
//!
//! Nothing here does I/O or touches timers; everything is safe to call from
//! any task with no side effects beyond the returned value.

use serde::{Deserialize, Serialize};

/// A width/height pair in container pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True if either dimension is missing. A zero-size container or artifact
    /// means layout has not happened yet.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// The pan/zoom transform applied to the rendered artifact.
///
/// `x`/`y` translate the artifact's top-left corner in container pixels;
/// `scale` is the uniform zoom factor (1.0 = 100%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl ViewportTransform {
    pub fn new(x: f32, y: f32, scale: f32) -> Self {
        Self { x, y, scale }
    }
}

/// Tuning limits for the viewport.
///
/// The defaults come from the shipped viewer configuration; they are UI
/// tuning values, not contracts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportLimits {
    /// Minimum zoom level
    pub min_scale: f32,
    /// Maximum zoom level
    pub max_scale: f32,
    /// Multiplier applied by one zoom-in step (zoom-out uses the inverse)
    pub zoom_step: f32,
    /// Scale restored by `reset()` and at the start of each settle sequence
    pub default_scale: f32,
    /// Keep the content rectangle intersecting the container rectangle
    pub limit_to_bounds: bool,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.4,
            max_scale: 5.0,
            zoom_step: 1.2,
            default_scale: 1.0,
            limit_to_bounds: true,
        }
    }
}

/// Clamp a scale into the configured range. Idempotent.
pub fn clamp_scale(limits: &ViewportLimits, scale: f32) -> f32 {
    scale.clamp(limits.min_scale, limits.max_scale)
}

/// Clamp a position so the scaled content rectangle keeps covering the
/// container.
///
/// Per axis: content smaller than the container is centered (there is no
/// non-empty intersection to clamp into), content larger than the container
/// may slide only within `[container - content*scale, 0]`.
pub fn clamp_position(
    x: f32,
    y: f32,
    scale: f32,
    container: Size,
    content: Size,
) -> (f32, f32) {
    (
        clamp_axis(x, container.width, content.width * scale),
        clamp_axis(y, container.height, content.height * scale),
    )
}

fn clamp_axis(pos: f32, container_len: f32, scaled_len: f32) -> f32 {
    if scaled_len <= container_len {
        (container_len - scaled_len) / 2.0
    } else {
        pos.clamp(container_len - scaled_len, 0.0)
    }
}

/// Current viewport transform plus its limits.
///
/// Shared (behind a mutex) between the controller, the settle task, and the
/// view itself; every mutation goes through the clamping helpers above.
#[derive(Debug, Clone)]
pub struct ViewportState {
    transform: ViewportTransform,
    limits: ViewportLimits,
}

impl ViewportState {
    pub fn new(limits: ViewportLimits) -> Self {
        Self {
            transform: ViewportTransform::new(0.0, 0.0, limits.default_scale),
            limits,
        }
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn limits(&self) -> &ViewportLimits {
        &self.limits
    }

    /// The neutral transform: origin position at the configured default scale.
    pub fn neutral(&self) -> ViewportTransform {
        ViewportTransform::new(0.0, 0.0, self.limits.default_scale)
    }

    /// Force the transform back to neutral. Used at the start of each settle
    /// sequence and by `reset()`.
    pub fn reset(&mut self) {
        self.transform = self.neutral();
    }

    /// Set the transform, passing scale and position through clamping.
    pub fn apply(&mut self, x: f32, y: f32, scale: f32, container: Size, content: Size) {
        let scale = clamp_scale(&self.limits, scale);
        let (x, y) = if self.limits.limit_to_bounds {
            clamp_position(x, y, scale, container, content)
        } else {
            (x, y)
        };
        self.transform = ViewportTransform::new(x, y, scale);
    }
}
