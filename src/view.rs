//! Diagram view - wires session, settle, controller, and surface together
//!
//! One `DiagramView` per display surface. Control flow:
//! host submits a description -> the session compiles it asynchronously ->
//! on success the artifact is inserted into the surface, the viewport is
//! force-reset to neutral, and a settle sequence is armed -> host-visible
//! events report progress. User-initiated controller calls may interrupt or
//! follow the settle sequence at any time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::compiler::{DiagramCompiler, VisualArtifact};
use crate::controller::ViewportController;
use crate::session::{RenderGeneration, RenderOutcome, RenderSession};
use crate::settle::{SettleConfig, SettlePhase, SettleTask};
use crate::surface::DisplaySurface;
use crate::viewport::{ViewportLimits, ViewportState, ViewportTransform};

/// Host-visible progress events for one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ViewEvent {
    /// A description was submitted; a compile is in flight
    RenderStarted { generation: RenderGeneration },
    /// The artifact for `generation` is now displayed
    RenderSucceeded { generation: RenderGeneration },
    /// The compiler rejected the current description; no diagram is shown
    RenderFailed {
        generation: RenderGeneration,
        message: String,
    },
    /// The automatic framing for `generation` ran to completion
    SettleFinished { generation: RenderGeneration },
}

/// Combined tuning for a view.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    pub limits: ViewportLimits,
    pub settle: SettleConfig,
}

/// Why an export produced no file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no diagram to export")]
    NoArtifact,
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

struct ApplyState {
    settle: Mutex<Option<SettleTask>>,
    artifact: Mutex<Option<VisualArtifact>>,
}

/// A pannable, zoomable diagram embedded in a host surface.
pub struct DiagramView {
    session: RenderSession,
    controller: ViewportController,
    surface: Arc<dyn DisplaySurface>,
    apply: Arc<ApplyState>,
    events: UnboundedSender<ViewEvent>,
    dispatcher: JoinHandle<()>,
}

impl DiagramView {
    /// Build a view over `surface`, compiling via `compiler`.
    ///
    /// Returns the view plus the receiver for host-visible events. Must be
    /// called within a tokio runtime.
    pub fn new(
        compiler: Arc<dyn DiagramCompiler>,
        surface: Arc<dyn DisplaySurface>,
        config: ViewConfig,
    ) -> (Self, UnboundedReceiver<ViewEvent>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let session = RenderSession::new(compiler, outcome_tx);
        let state = Arc::new(Mutex::new(ViewportState::new(config.limits)));
        let controller = ViewportController::new(Arc::clone(&state), Arc::clone(&surface));
        let apply = Arc::new(ApplyState {
            settle: Mutex::new(None),
            artifact: Mutex::new(None),
        });

        let dispatcher = tokio::spawn(Self::dispatch(
            outcome_rx,
            session.generation_handle(),
            Arc::clone(&surface),
            state,
            controller.clone(),
            config.settle,
            Arc::clone(&apply),
            event_tx.clone(),
        ));

        (
            Self {
                session,
                controller,
                surface,
                apply,
                events: event_tx,
                dispatcher,
            },
            event_rx,
        )
    }

    /// Submit a new diagram description.
    ///
    /// Supersedes any in-flight compile, cancels any in-flight settle
    /// sequence, and discards the previously displayed artifact; returns the
    /// new generation immediately.
    pub fn submit(&self, description: &str) -> RenderGeneration {
        if let Some(old) = self.apply.settle.lock().take() {
            old.cancel();
        }
        // The old generation's artifact is superseded the moment a new
        // description arrives, not when its replacement lands.
        *self.apply.artifact.lock() = None;
        self.surface.clear();
        // RenderStarted must be on the event channel before the compile can
        // produce an outcome, or a cache hit could surface RenderSucceeded
        // first.
        let generation = self.session.begin();
        let _ = self.events.send(ViewEvent::RenderStarted { generation });
        self.session.dispatch(generation, description);
        generation
    }

    /// The viewport API, for host UI controls.
    pub fn controller(&self) -> &ViewportController {
        &self.controller
    }

    pub fn transform(&self) -> ViewportTransform {
        self.controller.transform()
    }

    pub fn current_generation(&self) -> RenderGeneration {
        self.session.current_generation()
    }

    /// The currently displayed artifact, if any.
    pub fn artifact(&self) -> Option<VisualArtifact> {
        self.apply.artifact.lock().clone()
    }

    pub fn has_artifact(&self) -> bool {
        self.apply.artifact.lock().is_some()
    }

    /// Phase of the current settle sequence, if one was ever armed.
    pub fn settle_phase(&self) -> Option<SettlePhase> {
        self.apply.settle.lock().as_ref().map(|t| t.phase())
    }

    /// Write the displayed artifact's markup to `path`.
    pub fn export_svg(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        let artifact = self.artifact().ok_or(ExportError::NoArtifact)?;
        std::fs::write(path, artifact.svg.as_bytes()).map_err(|source| ExportError::Io {
            path: path.to_owned(),
            source,
        })?;
        log::info!("exported {} to {}", artifact.id, path.display());
        Ok(())
    }

    /// Drop all cached artifacts, forcing fresh compiles.
    pub fn clear_cache(&self) {
        self.session.cache().clear();
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        mut outcomes: mpsc::UnboundedReceiver<RenderOutcome>,
        current: Arc<std::sync::atomic::AtomicU64>,
        surface: Arc<dyn DisplaySurface>,
        state: Arc<Mutex<ViewportState>>,
        controller: ViewportController,
        settle_config: SettleConfig,
        apply: Arc<ApplyState>,
        events: UnboundedSender<ViewEvent>,
    ) {
        while let Some(outcome) = outcomes.recv().await {
            let generation = outcome.generation;
            // Fenced once at completion; re-check at the moment of applying.
            if current.load(std::sync::atomic::Ordering::SeqCst) != generation {
                log::debug!("outcome for generation {generation} superseded before apply");
                continue;
            }
            match outcome.result {
                Ok(artifact) => {
                    surface.insert(&artifact);
                    *apply.artifact.lock() = Some(artifact);
                    state.lock().reset();
                    let settle = SettleTask::spawn(
                        generation,
                        Arc::clone(&current),
                        controller.clone(),
                        settle_config,
                        events.clone(),
                    );
                    if let Some(old) = apply.settle.lock().replace(settle) {
                        old.cancel();
                    }
                    let _ = events.send(ViewEvent::RenderSucceeded { generation });
                }
                Err(err) => {
                    surface.clear();
                    *apply.artifact.lock() = None;
                    let _ = events.send(ViewEvent::RenderFailed {
                        generation,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

impl Drop for DiagramView {
    fn drop(&mut self) {
        self.dispatcher.abort();
        if let Some(settle) = self.apply.settle.lock().take() {
            settle.cancel();
        }
    }
}
