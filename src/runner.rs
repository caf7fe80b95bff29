//! The detection loop: a cooperative state machine driving
//! poll -> infer -> draw cycles.
//!
//! States: `Idle -> Starting -> Running -> Stopping -> Idle`. The loop is
//! a self-rescheduling task, not a fixed-period timer: each cycle begins
//! only after the previous cycle's draw completed, so a slow model slows
//! the cycle rate instead of building a queue.
//!
//! `stop()` is cooperative. It never aborts an in-flight inference; the
//! loop observes the request at the top of the next cycle and again right
//! before drawing, so results from a cycle that raced with a stop are
//! discarded and nothing mutates the overlay after the stop is
//! acknowledged.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;

use crate::camera::FrameSource;
use crate::model::ModelHandle;
use crate::overlay::OverlayRenderer;
use crate::{Error, Result};

const IDLE: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;
const STOPPING: u8 = 3;

/// Governs whether the loop schedules further cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl LoopState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            STARTING => LoopState::Starting,
            RUNNING => LoopState::Running,
            STOPPING => LoopState::Stopping,
            _ => LoopState::Idle,
        }
    }
}

/// Cloneable handle for observing and stopping a loop from another thread
/// (signal handlers, UI callbacks).
#[derive(Clone)]
pub struct LoopHandle {
    state: Arc<AtomicU8>,
}

impl LoopHandle {
    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Request a cooperative stop.
    ///
    /// No-op unless the loop is `Starting` or `Running`; an in-flight
    /// inference is allowed to finish and its results are discarded.
    pub fn stop(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::SeqCst, Ordering::SeqCst)
            .or_else(|_| {
                self.state
                    .compare_exchange(STARTING, STOPPING, Ordering::SeqCst, Ordering::SeqCst)
            });
    }
}

/// Outcome of a single detection cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Frame captured, inference ran, overlay replaced.
    Completed { accepted: usize },
    /// The source had no frame yet; the model was not invoked.
    Skipped,
    /// A stop request was acknowledged; the loop settled at `Idle`.
    Stopped,
}

/// Tuning knobs for the loop.
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// An inference call that ran longer than this is treated as failed:
    /// its results are discarded and the loop halts. A synchronous call
    /// cannot be preempted, so the bound is enforced after completion.
    pub infer_deadline: Duration,
    /// Pause between cycles. Back-pressure beyond this comes naturally
    /// from inference latency.
    pub cycle_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            infer_deadline: Duration::from_secs(2),
            cycle_interval: Duration::from_millis(33),
        }
    }
}

/// Per-run counters for health logging.
#[derive(Clone, Debug, Default)]
pub struct LoopStats {
    /// Cycles that completed a draw.
    pub cycles: u64,
    /// Cycles skipped because the source had no frame yet.
    pub frames_skipped: u64,
    /// Detections accepted by the overlay across the run.
    pub detections_drawn: u64,
    /// Wall time of the most recent completed cycle.
    pub last_cycle: Duration,
}

/// Drives capture -> infer -> overlay cycles for one frame source and one
/// model handle.
///
/// The loop exclusively owns its overlay and its bound source; the model
/// handle is shared but inference through it is serialized.
pub struct DetectionLoop {
    model: ModelHandle,
    overlay: OverlayRenderer,
    config: LoopConfig,
    state: Arc<AtomicU8>,
    source: Option<FrameSource>,
    stats: LoopStats,
}

impl DetectionLoop {
    pub fn new(model: ModelHandle, overlay: OverlayRenderer, config: LoopConfig) -> Self {
        Self {
            model,
            overlay,
            config,
            state: Arc::new(AtomicU8::new(IDLE)),
            source: None,
            stats: LoopStats::default(),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.overlay
    }

    /// Bind a frame source and transition `Idle -> Starting -> Running`.
    ///
    /// Fails with `NotReady` - synchronously, leaving state at `Idle` and
    /// acquiring nothing - unless the model is loaded and the source is
    /// live.
    pub fn start(&mut self, source: FrameSource) -> Result<()> {
        if self.state() != LoopState::Idle {
            return Err(Error::NotReady("loop already active"));
        }
        if self.model.is_disposed() {
            return Err(Error::NotReady("model not loaded"));
        }
        if !source.is_live() {
            return Err(Error::NotReady("frame source not live"));
        }

        self.state.store(STARTING, Ordering::SeqCst);
        log::info!(
            "detection loop starting: device={} model={}",
            source.device_id(),
            self.model.name()
        );
        self.overlay.set_coordinate_space(self.model.coordinate_space());
        self.source = Some(source);
        self.stats = LoopStats::default();

        // A stop may have raced in while we were in Starting.
        if self
            .state
            .compare_exchange(STARTING, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.settle_idle();
        }
        Ok(())
    }

    /// Run one capture -> infer -> draw cycle.
    ///
    /// Public so callers can single-step the loop; `run` drives this until
    /// a stop or failure.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        match self.state() {
            LoopState::Running => {}
            LoopState::Stopping => {
                self.settle_idle();
                return Ok(CycleOutcome::Stopped);
            }
            LoopState::Idle | LoopState::Starting => {
                return Err(Error::NotReady("loop not running"));
            }
        }
        let cycle_started = Instant::now();
        let source = self
            .source
            .clone()
            .ok_or(Error::NotReady("no frame source bound"))?;

        // 1. Current frame; none yet means skip without touching the model.
        let frame = match source.poll_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.stats.frames_skipped += 1;
                return Ok(CycleOutcome::Skipped);
            }
            Err(e) => {
                log::warn!("frame read failed: {}", e);
                self.settle_idle();
                return Err(e);
            }
        };
        if (frame.width, frame.height) != self.overlay.surface_size() {
            self.overlay.resize(frame.width, frame.height);
        }

        // 2. Inference. May block; stop requests are honored afterwards.
        let infer_started = Instant::now();
        let results = match self.model.infer(&frame) {
            Ok(results) => results,
            Err(e) => {
                log::warn!("inference failed, halting loop: {}", e);
                self.settle_idle();
                return Err(e);
            }
        };
        let infer_elapsed = infer_started.elapsed();
        if infer_elapsed > self.config.infer_deadline {
            log::warn!(
                "inference ran {:?}, past the {:?} deadline; halting loop",
                infer_elapsed,
                self.config.infer_deadline
            );
            self.settle_idle();
            return Err(Error::InferenceFailed(anyhow!(
                "inference exceeded deadline ({:?} > {:?})",
                infer_elapsed,
                self.config.infer_deadline
            )));
        }

        // 3+4. Re-check right before drawing: a stop that arrived during
        // inference discards these results.
        if self.state() != LoopState::Running {
            self.settle_idle();
            return Ok(CycleOutcome::Stopped);
        }
        let accepted = self.overlay.draw(&results);
        self.stats.cycles += 1;
        self.stats.detections_drawn += accepted as u64;
        self.stats.last_cycle = cycle_started.elapsed();

        // 5. Continue, or acknowledge a stop that arrived during the draw.
        if self.state() != LoopState::Running {
            self.settle_idle();
            return Ok(CycleOutcome::Stopped);
        }
        Ok(CycleOutcome::Completed { accepted })
    }

    /// Drive cycles until the loop stops or fails.
    ///
    /// Returns `Ok` on a clean (cooperative) stop; failures halt the loop
    /// at `Idle` and propagate.
    pub fn run(&mut self) -> Result<()> {
        const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
        let mut last_health_log = Instant::now();

        loop {
            match self.state() {
                LoopState::Running => {}
                LoopState::Stopping => {
                    self.settle_idle();
                    return Ok(());
                }
                LoopState::Idle | LoopState::Starting => return Ok(()),
            }

            match self.run_cycle()? {
                CycleOutcome::Stopped => return Ok(()),
                CycleOutcome::Completed { .. } | CycleOutcome::Skipped => {}
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "loop health: cycles={} skipped={} drawn={} last_cycle={:?}",
                    self.stats.cycles,
                    self.stats.frames_skipped,
                    self.stats.detections_drawn,
                    self.stats.last_cycle
                );
                last_health_log = Instant::now();
            }

            if self.state() == LoopState::Running && !self.config.cycle_interval.is_zero() {
                std::thread::sleep(self.config.cycle_interval);
            }
        }
    }

    /// Clear the overlay, release the source, settle at `Idle`.
    fn settle_idle(&mut self) {
        self.overlay.clear();
        if let Some(source) = self.source.take() {
            source.release();
        }
        self.state.store(IDLE, Ordering::SeqCst);
        log::info!(
            "detection loop idle: cycles={} skipped={} drawn={}",
            self.stats.cycles,
            self.stats.frames_skipped,
            self.stats.detections_drawn
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSource, SyntheticCamera, SyntheticConfig};
    use crate::model::backend::ModelBackend;
    use crate::model::result::{BoundingBox, CoordinateSpace, Detection};
    use crate::model::ModelProvider;
    use crate::Frame;

    struct ScriptedBackend {
        detections: Vec<Detection>,
    }

    impl ModelBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn coordinate_space(&self) -> CoordinateSpace {
            CoordinateSpace::Pixel
        }

        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            Ok(self.detections.clone())
        }
    }

    struct FailingBackend;

    impl ModelBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn coordinate_space(&self) -> CoordinateSpace {
            CoordinateSpace::Pixel
        }

        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            anyhow::bail!("tensor shape mismatch")
        }
    }

    struct SlowBackend {
        delay: Duration,
    }

    impl ModelBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn coordinate_space(&self) -> CoordinateSpace {
            CoordinateSpace::Pixel
        }

        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            std::thread::sleep(self.delay);
            Ok(Vec::new())
        }
    }

    fn scripted_handle(detections: Vec<Detection>) -> ModelHandle {
        ModelProvider::from_fn(move || {
            Ok(Box::new(ScriptedBackend {
                detections: detections.clone(),
            }) as Box<dyn ModelBackend>)
        })
        .load()
        .expect("scripted backend loads")
    }

    fn test_config() -> LoopConfig {
        LoopConfig {
            infer_deadline: Duration::from_secs(2),
            cycle_interval: Duration::ZERO,
        }
    }

    fn camera_source() -> (CameraSource, FrameSource) {
        let mut camera = CameraSource::new(Box::new(SyntheticCamera::with_defaults()));
        let source = camera.acquire("stub://front").expect("acquire stub");
        (camera, source)
    }

    #[test]
    fn start_with_unloaded_model_is_not_ready() {
        let handle = scripted_handle(Vec::new());
        handle.dispose();

        let (_camera, source) = camera_source();
        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), test_config());

        assert!(matches!(
            dloop.start(source.clone()),
            Err(Error::NotReady(_))
        ));
        assert_eq!(dloop.state(), LoopState::Idle);
        // No partial acquisition: the caller's source is untouched.
        assert!(source.is_live());
    }

    #[test]
    fn start_with_released_source_is_not_ready() {
        let handle = scripted_handle(Vec::new());
        let (_camera, source) = camera_source();
        source.release();

        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), test_config());
        assert!(matches!(dloop.start(source), Err(Error::NotReady(_))));
        assert_eq!(dloop.state(), LoopState::Idle);
    }

    #[test]
    fn cycle_draws_accepted_detections() -> Result<()> {
        let handle = scripted_handle(vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(10.0, 10.0, 50.0, 80.0),
        )]);
        let (_camera, source) = camera_source();
        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.66), test_config());

        dloop.start(source)?;
        assert_eq!(dloop.state(), LoopState::Running);

        let outcome = dloop.run_cycle()?;
        assert_eq!(outcome, CycleOutcome::Completed { accepted: 1 });
        assert_eq!(dloop.overlay().primitives().len(), 2);
        assert_eq!(dloop.overlay().surface_size(), (640, 480));
        assert_eq!(dloop.stats().cycles, 1);
        Ok(())
    }

    #[test]
    fn warmup_frames_skip_the_model() -> Result<()> {
        let handle = scripted_handle(Vec::new());
        let mut camera = CameraSource::new(Box::new(SyntheticCamera::new(SyntheticConfig {
            warmup_polls: 1,
            ..SyntheticConfig::default()
        })));
        let source = camera.acquire("stub://front")?;

        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), test_config());
        dloop.start(source)?;

        assert_eq!(dloop.run_cycle()?, CycleOutcome::Skipped);
        assert_eq!(dloop.stats().frames_skipped, 1);
        assert!(matches!(dloop.run_cycle()?, CycleOutcome::Completed { .. }));
        Ok(())
    }

    #[test]
    fn stop_is_acknowledged_at_cycle_top() -> Result<()> {
        let handle = scripted_handle(vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        )]);
        let (_camera, source) = camera_source();
        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), test_config());

        dloop.start(source.clone())?;
        dloop.run_cycle()?;
        assert!(!dloop.overlay().primitives().is_empty());

        dloop.handle().stop();
        assert_eq!(dloop.state(), LoopState::Stopping);

        assert_eq!(dloop.run_cycle()?, CycleOutcome::Stopped);
        assert_eq!(dloop.state(), LoopState::Idle);
        assert!(dloop.overlay().primitives().is_empty());
        assert!(!source.is_live());
        Ok(())
    }

    #[test]
    fn stop_on_idle_loop_is_a_no_op() {
        let handle = scripted_handle(Vec::new());
        let dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), test_config());

        dloop.handle().stop();
        assert_eq!(dloop.state(), LoopState::Idle);
    }

    #[test]
    fn inference_failure_halts_to_idle() -> Result<()> {
        let handle = ModelProvider::from_fn(|| Ok(Box::new(FailingBackend) as Box<dyn ModelBackend>))
            .load()?;
        let (_camera, source) = camera_source();
        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), test_config());

        dloop.start(source.clone())?;
        assert!(matches!(
            dloop.run_cycle(),
            Err(Error::InferenceFailed(_))
        ));
        assert_eq!(dloop.state(), LoopState::Idle);
        assert!(dloop.overlay().primitives().is_empty());
        assert!(!source.is_live());

        // No auto-retry: cycling again without start() is rejected.
        assert!(matches!(dloop.run_cycle(), Err(Error::NotReady(_))));
        Ok(())
    }

    #[test]
    fn deadline_overrun_discards_results_and_halts() -> Result<()> {
        let handle = ModelProvider::from_fn(|| {
            Ok(Box::new(SlowBackend {
                delay: Duration::from_millis(30),
            }) as Box<dyn ModelBackend>)
        })
        .load()?;
        let (_camera, source) = camera_source();
        let config = LoopConfig {
            infer_deadline: Duration::from_millis(1),
            cycle_interval: Duration::ZERO,
        };
        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), config);

        dloop.start(source)?;
        assert!(matches!(
            dloop.run_cycle(),
            Err(Error::InferenceFailed(_))
        ));
        assert_eq!(dloop.state(), LoopState::Idle);
        Ok(())
    }

    #[test]
    fn restart_after_stop_works() -> Result<()> {
        let handle = scripted_handle(Vec::new());
        let mut camera = CameraSource::new(Box::new(SyntheticCamera::with_defaults()));
        let mut dloop = DetectionLoop::new(handle, OverlayRenderer::new(0.5), test_config());

        let source = camera.acquire("stub://front")?;
        dloop.start(source)?;
        dloop.handle().stop();
        assert_eq!(dloop.run_cycle()?, CycleOutcome::Stopped);

        // The caller must restart explicitly, with a fresh acquisition.
        let source = camera.acquire("stub://front")?;
        dloop.start(source)?;
        assert_eq!(dloop.state(), LoopState::Running);
        assert!(matches!(dloop.run_cycle()?, CycleOutcome::Completed { .. }));
        Ok(())
    }
}
