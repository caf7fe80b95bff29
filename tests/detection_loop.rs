//! End-to-end loop behavior with synthetic camera and scripted models.

use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use framewatch::camera::{SyntheticCamera, SyntheticConfig};
use framewatch::model::{ModelLoader, ModelProvider};
use framewatch::{
    BoundingBox, CameraSource, CaptureDevice, CoordinateSpace, CycleOutcome, Detection,
    DetectionLoop, Frame, LoopConfig, LoopState, ModelBackend, ModelHandle, OverlayPrimitive,
    OverlayRenderer,
};

/// Hands out a pre-built backend exactly once.
struct OnceLoader(Mutex<Option<Box<dyn ModelBackend>>>);

impl OnceLoader {
    fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self(Mutex::new(Some(backend)))
    }
}

impl ModelLoader for OnceLoader {
    fn load(&self) -> anyhow::Result<Box<dyn ModelBackend>> {
        self.0
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("backend already taken"))
    }
}

fn handle_for(backend: Box<dyn ModelBackend>) -> ModelHandle {
    ModelProvider::new(Box::new(OnceLoader::new(backend)))
        .load()
        .expect("backend loads")
}

fn zero_interval() -> LoopConfig {
    LoopConfig {
        infer_deadline: Duration::from_secs(5),
        cycle_interval: Duration::ZERO,
    }
}

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

/// Blocks inside `infer` until the test releases it, so a stop request
/// can be issued while a call is in flight.
struct GateBackend {
    entered_tx: mpsc::Sender<()>,
    release_rx: mpsc::Receiver<()>,
}

impl ModelBackend for GateBackend {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn coordinate_space(&self) -> CoordinateSpace {
        CoordinateSpace::Pixel
    }

    fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
        self.entered_tx.send(()).ok();
        self.release_rx.recv().ok();
        Ok(vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(10.0, 10.0, 50.0, 80.0),
        )])
    }
}

#[test]
fn full_scenario_from_enumeration_to_stop() {
    let mut camera = CameraSource::new(Box::new(SyntheticCamera::new(SyntheticConfig {
        devices: vec![CaptureDevice {
            id: "cam1".to_string(),
            label: "Front".to_string(),
        }],
        ..SyntheticConfig::default()
    })));

    let devices = camera.enumerate().expect("enumeration succeeds").to_vec();
    assert_eq!(
        devices,
        vec![CaptureDevice {
            id: "cam1".to_string(),
            label: "Front".to_string(),
        }]
    );

    let source = camera.acquire("cam1").expect("acquire cam1");

    let model = handle_for(Box::new(ScriptedBackend {
        detections: vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(10.0, 10.0, 50.0, 80.0),
        )],
    }));
    let mut dloop = DetectionLoop::new(model, OverlayRenderer::new(0.66), zero_interval());

    assert_eq!(dloop.state(), LoopState::Idle);
    dloop.start(source.clone()).expect("start succeeds");
    assert_eq!(dloop.state(), LoopState::Running);

    let outcome = dloop.run_cycle().expect("cycle succeeds");
    assert_eq!(outcome, CycleOutcome::Completed { accepted: 1 });

    // Model-pixel coordinates on a 640x480 surface: no scaling.
    assert_eq!(dloop.overlay().surface_size(), (640, 480));
    let primitives = dloop.overlay().primitives();
    assert_eq!(primitives.len(), 2);
    match &primitives[0] {
        OverlayPrimitive::Box { rect } => {
            assert_eq!((rect.x, rect.y, rect.width, rect.height), (10.0, 10.0, 50.0, 80.0));
        }
        other => panic!("expected box, got {:?}", other),
    }
    match &primitives[1] {
        OverlayPrimitive::Label { text, .. } => assert_eq!(text, "person - 90%"),
        other => panic!("expected label, got {:?}", other),
    }

    dloop.handle().stop();
    assert_eq!(dloop.run_cycle().expect("stop cycle"), CycleOutcome::Stopped);
    assert_eq!(dloop.state(), LoopState::Idle);
    assert!(dloop.overlay().primitives().is_empty());
    assert!(!source.is_live());
}

#[test]
fn stop_during_inflight_inference_discards_results() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();

    let model = handle_for(Box::new(GateBackend {
        entered_tx,
        release_rx,
    }));

    let mut camera = CameraSource::new(Box::new(SyntheticCamera::with_defaults()));
    let source = camera.acquire("stub://front").expect("acquire stub");

    let mut dloop = DetectionLoop::new(model, OverlayRenderer::new(0.5), zero_interval());
    dloop.start(source.clone()).expect("start succeeds");
    let handle = dloop.handle();

    let worker = std::thread::spawn(move || {
        let result = dloop.run();
        (dloop, result)
    });

    // Wait until the loop is inside infer, then request a stop and let the
    // in-flight call finish.
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("loop reached infer");
    handle.stop();
    release_tx.send(()).expect("release gate");

    let (dloop, result) = worker.join().expect("loop thread joins");
    result.expect("cooperative stop is not an error");

    // The in-flight result was discarded: overlay is clear, loop is Idle.
    assert_eq!(dloop.state(), LoopState::Idle);
    assert!(dloop.overlay().primitives().is_empty());
    assert!(!source.is_live());
}

#[test]
fn loop_failure_is_isolated_to_the_loop() {
    struct FailingBackend;

    impl ModelBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn coordinate_space(&self) -> CoordinateSpace {
            CoordinateSpace::Pixel
        }

        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            anyhow::bail!("model error")
        }
    }

    let mut camera = CameraSource::new(Box::new(SyntheticCamera::with_defaults()));
    let source = camera.acquire("stub://front").expect("acquire stub");

    let model = handle_for(Box::new(FailingBackend));
    let mut dloop = DetectionLoop::new(model, OverlayRenderer::new(0.5), zero_interval());
    dloop.start(source).expect("start succeeds");

    assert!(dloop.run().is_err());
    assert_eq!(dloop.state(), LoopState::Idle);

    // The camera itself is still usable for a fresh acquisition.
    let source = camera.acquire("stub://front").expect("re-acquire");
    assert!(source.is_live());
}
