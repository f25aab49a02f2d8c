//! Render session - generation-fenced asynchronous compilation
//!
//! Compile latency is externally controlled and unbounded. Without fencing,
//! rapid successive edits would race: an old diagram could apply after a
//! newer, faster one already rendered. Each submission gets a monotonically
//! increasing generation; a completion is forwarded only if its generation
//! still equals the session's current one, otherwise it is dropped silently
//! (an expected consequence of re-submission, not a failure).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::cache::ArtifactCache;
use crate::compiler::{new_artifact_id, CompileError, DiagramCompiler, VisualArtifact};

/// Monotonically increasing id fencing one submitted description.
pub type RenderGeneration = u64;

/// Completion of one compile, already fenced once at completion time.
/// Consumers must re-check currency at the moment they apply it.
#[derive(Debug)]
pub struct RenderOutcome {
    pub generation: RenderGeneration,
    pub result: Result<VisualArtifact, CompileError>,
}

/// Owns the generation counter and the compile tasks.
pub struct RenderSession {
    compiler: Arc<dyn DiagramCompiler>,
    cache: Arc<ArtifactCache>,
    current: Arc<AtomicU64>,
    outcomes: UnboundedSender<RenderOutcome>,
}

impl RenderSession {
    pub fn new(
        compiler: Arc<dyn DiagramCompiler>,
        outcomes: UnboundedSender<RenderOutcome>,
    ) -> Self {
        Self {
            compiler,
            cache: Arc::new(ArtifactCache::new()),
            current: Arc::new(AtomicU64::new(0)),
            outcomes,
        }
    }

    /// The authoritative current generation. 0 until the first submission.
    pub fn current_generation(&self) -> RenderGeneration {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: RenderGeneration) -> bool {
        self.current_generation() == generation
    }

    /// Shared handle to the generation counter, for timer callbacks that must
    /// re-check currency as their first action.
    pub fn generation_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.current)
    }

    /// Submit a new description, superseding any in-flight compile.
    ///
    /// Returns immediately with the new generation; the result arrives on the
    /// outcome channel, and only if this generation is still current then.
    pub fn submit(&self, description: &str) -> RenderGeneration {
        let generation = self.begin();
        self.dispatch(generation, description);
        generation
    }

    /// Allocate the next generation, superseding all earlier submissions.
    ///
    /// Split from [`Self::dispatch`] so a caller can observe the new
    /// generation (and report it) before any outcome can possibly arrive.
    pub fn begin(&self) -> RenderGeneration {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Start the compile for an already-allocated generation.
    pub fn dispatch(&self, generation: RenderGeneration, description: &str) {
        log::info!(
            "render submitted: generation {generation}, {} bytes",
            description.len()
        );

        if let Some(artifact) = self.cache.get(description) {
            let _ = self.outcomes.send(RenderOutcome {
                generation,
                result: Ok(artifact),
            });
            return;
        }

        let compiler = Arc::clone(&self.compiler);
        let cache = Arc::clone(&self.cache);
        let current = Arc::clone(&self.current);
        let outcomes = self.outcomes.clone();
        let description = description.to_owned();
        let id = new_artifact_id();
        tokio::spawn(async move {
            let result = compiler.compile(&id, &description).await;
            if current.load(Ordering::SeqCst) != generation {
                log::debug!("discarding stale compile for generation {generation}");
                return;
            }
            match &result {
                Ok(artifact) => {
                    log::info!("render succeeded: generation {generation}");
                    cache.insert(&description, artifact.clone());
                }
                Err(err) => log::warn!("render failed: generation {generation}: {err}"),
            }
            let _ = outcomes.send(RenderOutcome { generation, result });
        });
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Compiler stub with a configurable per-description delay.
    struct StubCompiler {
        delays: Mutex<HashMap<String, Duration>>,
        calls: AtomicUsize,
    }

    impl StubCompiler {
        fn new() -> Self {
            Self {
                delays: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_delay(self, description: &str, delay: Duration) -> Self {
            self.delays.lock().insert(description.to_owned(), delay);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DiagramCompiler for StubCompiler {
        fn compile(
            &self,
            id: &str,
            source: &str,
        ) -> BoxFuture<'static, Result<VisualArtifact, CompileError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self
                .delays
                .lock()
                .get(source)
                .copied()
                .unwrap_or(Duration::ZERO);
            let id = id.to_owned();
            let source = source.to_owned();
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                if source.contains("BAD_SYNTAX") {
                    Err(CompileError::Syntax {
                        message: format!("cannot parse {source:?}"),
                    })
                } else {
                    Ok(VisualArtifact::new(
                        id,
                        format!(r#"<svg width="100" height="100"><!--{source}--></svg>"#),
                    ))
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generations_increase_monotonically() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = RenderSession::new(Arc::new(StubCompiler::new()), tx);
        assert_eq!(session.current_generation(), 0);
        assert_eq!(session.submit("a"), 1);
        assert_eq!(session.submit("b"), 2);
        assert_eq!(session.current_generation(), 2);
        assert!(session.is_current(2));
        assert!(!session.is_current(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_then_dispatch_matches_submit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = RenderSession::new(Arc::new(StubCompiler::new()), tx);
        let generation = session.begin();
        assert_eq!(generation, 1);
        assert_eq!(session.current_generation(), 1);
        session.dispatch(generation, "a");
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.generation, generation);
        assert!(outcome.result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stale_compile_is_discarded() {
        let compiler = StubCompiler::new()
            .with_delay("A", Duration::from_millis(300))
            .with_delay("B", Duration::from_millis(20));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = RenderSession::new(Arc::new(compiler), tx);

        session.submit("A");
        let gen_b = session.submit("B");

        // B completes first and is the only outcome that ever arrives, even
        // after A's longer delay has elapsed.
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.generation, gen_b);
        let artifact = outcome.result.unwrap();
        assert!(artifact.svg.contains("B"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_for_current_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = RenderSession::new(Arc::new(StubCompiler::new()), tx);
        let generation = session.submit("BAD_SYNTAX");
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.generation, generation);
        let err = outcome.result.unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_is_silent() {
        let compiler = StubCompiler::new().with_delay("BAD_SYNTAX", Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = RenderSession::new(Arc::new(compiler), tx);

        session.submit("BAD_SYNTAX");
        let gen_ok = session.submit("ok");

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.generation, gen_ok);
        assert!(outcome.result.is_ok());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_compiler() {
        let compiler = Arc::new(StubCompiler::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = RenderSession::new(Arc::clone(&compiler) as Arc<dyn DiagramCompiler>, tx);

        session.submit("graph TD; A-->B");
        let first = rx.recv().await.unwrap().result.unwrap();
        assert_eq!(compiler.calls(), 1);

        session.submit("graph TD; A-->B");
        let second = rx.recv().await.unwrap().result.unwrap();
        assert_eq!(compiler.calls(), 1);
        assert_eq!(first, second);
    }
}
