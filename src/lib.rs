//! Diagram Studio - embeddable diagram render and viewport engine
//!
//! Turns a textual diagram description into a pannable, zoomable artifact
//! embedded in a host surface:
//! - Asynchronous compilation via a pluggable external compiler
//! - Generation fencing so stale compiles never clobber newer ones
//! - Pan/zoom viewport with scale and bounds clamping
//! - Automated two-phase "settle" framing after each successful render
//! - Content-hash artifact cache and SVG export

pub mod cache;
pub mod compiler;
pub mod controller;
pub mod session;
pub mod settle;
pub mod surface;
pub mod view;
pub mod viewport;

// Re-export commonly used types
pub use cache::ArtifactCache;
pub use compiler::{new_artifact_id, CompileError, DiagramCompiler, VisualArtifact};
pub use controller::ViewportController;
pub use session::{RenderGeneration, RenderOutcome, RenderSession};
pub use settle::{SettleConfig, SettlePhase, SettleTask};
pub use surface::{DisplaySurface, HeadlessSurface};
pub use view::{DiagramView, ExportError, ViewConfig, ViewEvent};
pub use viewport::{
    clamp_position, clamp_scale, Size, ViewportLimits, ViewportState, ViewportTransform,
};
