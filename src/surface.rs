//! Host display-surface boundary
//!
//! The surface is the container element the engine inserts compiled markup
//! into and measures for geometry. The engine does not own the container's
//! lifecycle; a GUI host adapts its widget tree behind this trait. A
//! [`HeadlessSurface`] is provided for tests and headless tooling.

use std::sync::OnceLock;

use parking_lot::Mutex;
use regex::Regex;

use crate::compiler::VisualArtifact;
use crate::viewport::Size;

/// Where compiled diagrams are displayed and measured.
///
/// `content_size` must report `Size::ZERO` until an artifact has been
/// inserted and measured by the host's layout pass; the engine treats zero
/// geometry as "not ready yet" and turns viewport operations into no-ops.
pub trait DisplaySurface: Send + Sync {
    /// Insert (replacing any previous) the artifact's markup.
    fn insert(&self, artifact: &VisualArtifact);

    /// Remove the displayed artifact, if any.
    fn clear(&self);

    /// Current container size in pixels.
    fn container_size(&self) -> Size;

    /// Measured size of the displayed artifact, or zero while unmeasured.
    fn content_size(&self) -> Size;
}

/// In-memory surface with a fixed container size.
///
/// Content is "measured" by scanning the SVG root tag for `width`/`height`
/// attributes; markup without measurable dimensions reports zero, just like
/// a host mid-layout.
pub struct HeadlessSurface {
    container: Size,
    content: Mutex<Size>,
    displayed: Mutex<Option<String>>,
}

impl HeadlessSurface {
    pub fn new(container: Size) -> Self {
        Self {
            container,
            content: Mutex::new(Size::ZERO),
            displayed: Mutex::new(None),
        }
    }

    /// Id of the currently displayed artifact, if any.
    pub fn displayed_id(&self) -> Option<String> {
        self.displayed.lock().clone()
    }

    fn measure(svg: &str) -> Size {
        static WIDTH: OnceLock<Regex> = OnceLock::new();
        static HEIGHT: OnceLock<Regex> = OnceLock::new();
        let width = WIDTH.get_or_init(|| {
            Regex::new(r#"width\s*=\s*"([0-9]+(?:\.[0-9]+)?)(?:px)?""#)
                .expect("width attribute pattern")
        });
        let height = HEIGHT.get_or_init(|| {
            Regex::new(r#"height\s*=\s*"([0-9]+(?:\.[0-9]+)?)(?:px)?""#)
                .expect("height attribute pattern")
        });

        let root_end = svg.find('>').map(|i| i + 1).unwrap_or(svg.len());
        let root = &svg[..root_end];
        Size::new(
            Self::attribute(root, width).unwrap_or(0.0),
            Self::attribute(root, height).unwrap_or(0.0),
        )
    }

    fn attribute(tag: &str, re: &Regex) -> Option<f32> {
        re.captures(tag)?.get(1)?.as_str().parse().ok()
    }
}

impl DisplaySurface for HeadlessSurface {
    fn insert(&self, artifact: &VisualArtifact) {
        *self.displayed.lock() = Some(artifact.id.clone());
        *self.content.lock() = Self::measure(&artifact.svg);
    }

    fn clear(&self) {
        *self.displayed.lock() = None;
        *self.content.lock() = Size::ZERO;
    }

    fn container_size(&self) -> Size {
        self.container
    }

    fn content_size(&self) -> Size {
        *self.content.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measures_svg_dimensions() {
        let surface = HeadlessSurface::new(Size::new(800.0, 600.0));
        surface.insert(&VisualArtifact::new(
            "diagram-1",
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="1024" height="768.5"><g/></svg>"#,
        ));
        assert_eq!(surface.content_size(), Size::new(1024.0, 768.5));
        assert_eq!(surface.displayed_id().as_deref(), Some("diagram-1"));
    }

    #[test]
    fn test_px_suffix_and_attribute_order() {
        let surface = HeadlessSurface::new(Size::new(800.0, 600.0));
        surface.insert(&VisualArtifact::new(
            "diagram-2",
            r#"<svg height="300px" width="450px" viewBox="0 0 450 300"></svg>"#,
        ));
        assert_eq!(surface.content_size(), Size::new(450.0, 300.0));
    }

    #[test]
    fn test_unmeasurable_markup_reports_zero() {
        let surface = HeadlessSurface::new(Size::new(800.0, 600.0));
        surface.insert(&VisualArtifact::new("diagram-3", "<svg><g/></svg>"));
        assert!(surface.content_size().is_empty());
    }

    #[test]
    fn test_clear_forgets_artifact() {
        let surface = HeadlessSurface::new(Size::new(800.0, 600.0));
        surface.insert(&VisualArtifact::new(
            "diagram-4",
            r#"<svg width="10" height="10"/>"#,
        ));
        surface.clear();
        assert!(surface.displayed_id().is_none());
        assert!(surface.content_size().is_empty());
    }
}
