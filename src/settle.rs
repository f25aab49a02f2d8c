//! Settle sequencer - automated framing after a successful render
//!
//! The rendered artifact's true dimensions are only known after the host's
//! layout pass, which cannot be observed synchronously. The sequencer waits a
//! short configurable delay, centers the artifact at the target scale, waits
//! again, then shifts the view up by a fixed offset to clear header chrome:
//!
//!   Scheduled -> (T1) center -> Offsetting -> (T2) offset -> Settled
//!
//! Every timer continuation re-checks the render generation as its very first
//! action; a task whose generation has been superseded transitions to
//! Cancelled without touching the transform. `cancel()` aborts the task so a
//! stale timer never executes at all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::controller::ViewportController;
use crate::session::RenderGeneration;
use crate::view::ViewEvent;

/// Tuning for the settle sequence.
///
/// The defaults were arrived at empirically in the shipped viewer; they are
/// configurable values, not contracts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Delay before the centering step, giving layout time to measure the
    /// freshly inserted artifact
    pub initial_delay: Duration,
    /// Delay between centering and the vertical offset step
    pub offset_delay: Duration,
    /// Scale used by the centering step
    pub target_scale: f32,
    /// Pixels the view is shifted up after centering
    pub vertical_offset: f32,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(120),
            offset_delay: Duration::from_millis(50),
            target_scale: 1.6,
            vertical_offset: 80.0,
        }
    }
}

/// Where a settle task currently is. `Settled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlePhase {
    Scheduled,
    Offsetting,
    Settled,
    Cancelled,
}

impl SettlePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlePhase::Settled | SettlePhase::Cancelled)
    }
}

/// One in-flight settle sequence, tagged with its generation.
pub struct SettleTask {
    generation: RenderGeneration,
    phase: Arc<Mutex<SettlePhase>>,
    task: JoinHandle<()>,
}

impl SettleTask {
    /// Arm the two-phase sequence for `generation`.
    ///
    /// `current` is the session's authoritative generation counter; the task
    /// consults it before each step.
    pub fn spawn(
        generation: RenderGeneration,
        current: Arc<AtomicU64>,
        controller: ViewportController,
        config: SettleConfig,
        events: UnboundedSender<ViewEvent>,
    ) -> Self {
        let phase = Arc::new(Mutex::new(SettlePhase::Scheduled));
        let task_phase = Arc::clone(&phase);
        let task = tokio::spawn(async move {
            tokio::time::sleep(config.initial_delay).await;
            if current.load(Ordering::SeqCst) != generation {
                log::debug!("settle for generation {generation} superseded before centering");
                *task_phase.lock() = SettlePhase::Cancelled;
                return;
            }
            controller.center(config.target_scale);
            *task_phase.lock() = SettlePhase::Offsetting;

            tokio::time::sleep(config.offset_delay).await;
            if current.load(Ordering::SeqCst) != generation {
                log::debug!("settle for generation {generation} superseded before offsetting");
                *task_phase.lock() = SettlePhase::Cancelled;
                return;
            }
            let t = controller.transform();
            controller.set_transform(t.x, t.y - config.vertical_offset, t.scale);
            *task_phase.lock() = SettlePhase::Settled;
            log::debug!("settle for generation {generation} complete");
            let _ = events.send(ViewEvent::SettleFinished { generation });
        });
        Self {
            generation,
            phase,
            task,
        }
    }

    pub fn generation(&self) -> RenderGeneration {
        self.generation
    }

    pub fn phase(&self) -> SettlePhase {
        *self.phase.lock()
    }

    /// Abort the task, actually clearing any armed timer. A late callback
    /// must never execute, not merely find a flag set.
    pub fn cancel(&self) {
        self.task.abort();
        let mut phase = self.phase.lock();
        if !phase.is_terminal() {
            log::debug!("settle for generation {} cancelled", self.generation);
            *phase = SettlePhase::Cancelled;
        }
    }
}

impl Drop for SettleTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::VisualArtifact;
    use crate::surface::{DisplaySurface, HeadlessSurface};
    use crate::viewport::{Size, ViewportLimits, ViewportState};
    use tokio::sync::mpsc;

    fn test_controller() -> ViewportController {
        let surface = Arc::new(HeadlessSurface::new(Size::new(800.0, 600.0)));
        surface.insert(&VisualArtifact::new(
            "diagram-test",
            r#"<svg width="2200" height="1400"/>"#,
        ));
        let state = Arc::new(Mutex::new(ViewportState::new(ViewportLimits::default())));
        ViewportController::new(state, surface)
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_runs_both_phases() {
        let controller = test_controller();
        let current = Arc::new(AtomicU64::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = SettleTask::spawn(1, current, controller.clone(), SettleConfig::default(), tx);

        assert_eq!(task.phase(), SettlePhase::Scheduled);
        let event = rx.recv().await.unwrap();
        assert_eq!(event, ViewEvent::SettleFinished { generation: 1 });
        assert_eq!(task.phase(), SettlePhase::Settled);

        let t = controller.transform();
        assert_eq!(t.scale, 1.6);
        // Centered, then shifted up by the default 80px.
        assert!((t.x - (800.0 - 2200.0 * 1.6) / 2.0).abs() < 1e-3);
        assert!((t.y - ((600.0 - 1400.0 * 1.6) / 2.0 - 80.0)).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_generation_never_mutates_transform() {
        let controller = test_controller();
        let current = Arc::new(AtomicU64::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let before = controller.transform();
        let task = SettleTask::spawn(
            1,
            Arc::clone(&current),
            controller.clone(),
            SettleConfig::default(),
            tx,
        );

        // A newer description arrives before T1 fires.
        current.store(2, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(task.phase(), SettlePhase::Cancelled);
        assert_eq!(controller.transform(), before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_armed_timer() {
        let controller = test_controller();
        let current = Arc::new(AtomicU64::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let before = controller.transform();
        let task = SettleTask::spawn(1, current, controller.clone(), SettleConfig::default(), tx);

        task.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;

        // Generation 1 is still current, but the timers were cleared.
        assert_eq!(task.phase(), SettlePhase::Cancelled);
        assert_eq!(controller.transform(), before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersede_between_phases() {
        let controller = test_controller();
        let current = Arc::new(AtomicU64::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = SettleConfig::default();
        let task = SettleTask::spawn(
            1,
            Arc::clone(&current),
            controller.clone(),
            config,
            tx,
        );

        // Let T1 fire, then supersede before T2.
        tokio::time::sleep(config.initial_delay + Duration::from_millis(10)).await;
        assert_eq!(task.phase(), SettlePhase::Offsetting);
        let centered = controller.transform();
        current.store(2, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(task.phase(), SettlePhase::Cancelled);
        assert_eq!(controller.transform(), centered);
        assert!(rx.try_recv().is_err());
    }
}
