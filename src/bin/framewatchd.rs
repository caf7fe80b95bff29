//! framewatchd - live detection daemon
//!
//! This daemon:
//! 1. Loads configuration (JSON file + FRAMEWATCH_* env overrides)
//! 2. Enumerates capture devices and acquires the configured one
//! 3. Loads the detection profile's model through the profile registry
//! 4. Runs the detection loop until Ctrl-C (or for a bounded cycle count)
//! 5. Tears down cleanly: overlay cleared, source released, model disposed

use anyhow::Result;
use clap::Parser;

use framewatch::camera::{CameraBackend, SyntheticCamera, SyntheticConfig};
use framewatch::config::FramewatchConfig;
use framewatch::model::standard_registry;
use framewatch::{CameraSource, CaptureDevice, DetectionLoop, LoopState, OverlayRenderer};

#[derive(Debug, Parser)]
#[command(name = "framewatchd", about = "Webcam-driven detection loop daemon")]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "FRAMEWATCH_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Capture device id (overrides the config file).
    #[arg(long)]
    device: Option<String>,

    /// Detection profile name (overrides the config file).
    #[arg(long)]
    profile: Option<String>,

    /// List capture devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Run a bounded number of cycles instead of running until Ctrl-C.
    #[arg(long)]
    cycles: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("FRAMEWATCH_CONFIG", path);
    }
    let mut cfg = FramewatchConfig::load()?;
    if let Some(device) = args.device {
        cfg.camera.device = device;
    }
    if let Some(profile) = args.profile {
        cfg.detect.profile = profile;
    }

    let mut camera = CameraSource::new(make_backend(&cfg)?);
    let devices = camera.enumerate()?.to_vec();
    if args.list_devices {
        print_devices(&devices);
        return Ok(());
    }

    let mut registry = standard_registry();
    let (model, policy_threshold) = registry.load(&cfg.detect.profile)?;
    let threshold = cfg.detect.confidence_threshold.unwrap_or(policy_threshold);
    log::info!(
        "profile '{}' ready: model={} threshold={:.2}",
        cfg.detect.profile,
        model.name(),
        threshold
    );

    let overlay = OverlayRenderer::new(threshold);
    let mut dloop = DetectionLoop::new(model.clone(), overlay, cfg.detect.loop_config());

    let stopper = dloop.handle();
    ctrlc::set_handler(move || {
        log::info!("stop requested");
        stopper.stop();
    })?;

    let source = camera.acquire(&cfg.camera.device)?;
    dloop.start(source)?;
    log::info!("framewatchd running on {}", cfg.camera.device);

    let outcome = match args.cycles {
        Some(limit) => run_bounded(&mut dloop, limit, cfg.detect.cycle_interval),
        None => dloop.run().map_err(anyhow::Error::new),
    };

    log::info!(
        "final stats: cycles={} skipped={} drawn={}",
        dloop.stats().cycles,
        dloop.stats().frames_skipped,
        dloop.stats().detections_drawn
    );
    registry.dispose_all();
    camera.release();
    outcome
}

fn run_bounded(
    dloop: &mut DetectionLoop,
    limit: u64,
    cycle_interval: std::time::Duration,
) -> Result<()> {
    for _ in 0..limit {
        if dloop.state() != LoopState::Running {
            break;
        }
        dloop.run_cycle()?;
        std::thread::sleep(cycle_interval);
    }
    dloop.handle().stop();
    dloop.run()?;
    Ok(())
}

fn make_backend(cfg: &FramewatchConfig) -> Result<Box<dyn CameraBackend>> {
    if cfg.camera.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(SyntheticConfig {
            devices: vec![CaptureDevice {
                id: cfg.camera.device.clone(),
                label: "Synthetic".to_string(),
            }],
            width: cfg.camera.width,
            height: cfg.camera.height,
            warmup_polls: cfg.camera.warmup_polls,
            deny_permission: false,
        })));
    }

    #[cfg(feature = "camera-v4l2")]
    {
        return Ok(Box::new(framewatch::camera::V4l2Camera::new(
            cfg.camera.width,
            cfg.camera.height,
        )));
    }

    #[cfg(not(feature = "camera-v4l2"))]
    Err(anyhow::anyhow!(
        "device {} requires the camera-v4l2 feature",
        cfg.camera.device
    ))
}

fn print_devices(devices: &[CaptureDevice]) {
    if devices.is_empty() {
        println!("no capture devices found");
        return;
    }
    for device in devices {
        println!("{}\t{}", device.id, device.label);
    }
}
