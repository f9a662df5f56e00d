//! Gray Code Structured Light Scanner
//!
//! Runs one capture against the simulated rig: an offscreen projector and a
//! camera photographing it. Usage: `graycode-scanner [config.json|config.xml]`

use graycode_scanner::camera::SimulatedCamera;
use graycode_scanner::capture::{CaptureEvent, FrameKind, StructuredLightCapture};
use graycode_scanner::config::{load_config, ScannerConfig};
use graycode_scanner::projector::{OffscreenSurface, Pattern, PatternSequencer};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match load_config(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => ScannerConfig::default(),
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ScannerConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let bit_range = config.bit_range()?;
    let projector = &config.projector;
    let camera_config = &config.camera;

    let surface = OffscreenSurface::new(projector.width, projector.height, projector.max_brightness);
    let mut sequencer = PatternSequencer::new(surface);

    let camera = SimulatedCamera::new(
        sequencer.surface().frame(),
        camera_config.width,
        camera_config.height,
    )
    .with_lighting(camera_config.ambient, camera_config.gain);

    let mut capture = StructuredLightCapture::new(camera, sequencer.subscribe());
    capture.set_bit_range(bit_range.low_bit(), bit_range.high_bit())?;
    capture.preview_enabled = config.preview;
    let events = capture.subscribe();

    // White reference first, as the projector idles on it.
    sequencer.enqueue(Pattern::white());
    capture.request_frame(FrameKind::Binary)?;

    loop {
        sequencer.pump();
        if sequencer.is_rendering() {
            sequencer.pattern_displayed();
        }
        capture.process_events();

        while let Some(exposure) = capture.camera_mut().take_exposure() {
            capture.on_exposure_ready(exposure);
        }

        for event in events.try_iter() {
            match event {
                CaptureEvent::Intermediate(_) => {
                    log::info!("Progress: {:.0}%", capture.progress() * 100.0);
                }
                CaptureEvent::Decoded(frame) => {
                    log::info!(
                        "Decoded {}x{}, {} confident pixels, max index {}",
                        frame.width,
                        frame.height,
                        frame.valid_count(0.1),
                        frame.max_index()
                    );
                    frame.save_png(&config.output)?;
                    log::info!(
                        "Wrote {} ({} patterns projected)",
                        config.output.display(),
                        sequencer.projected_count()
                    );
                    return Ok(());
                }
                CaptureEvent::Failed(reason) => return Err(reason.into()),
            }
        }

        if capture.state().is_idle() && !sequencer.is_rendering() {
            return Err("capture stopped without a decoded frame".into());
        }
    }
}
