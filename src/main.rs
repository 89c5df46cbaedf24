use spinnaker_camera::{
    camera::SimulatedSystem,
    cli::CliArgs,
    config::Config,
    display::{DisplaySink, DrawOutcome, SnapshotSink, StatsSink},
    frame::FrameView,
    helpers::RateMeter,
    logging, new_session,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Stands in for the window: tracks what was drawn and keeps a copy for the snapshot.
struct ViewerSink {
    stats: StatsSink,
    snapshot: Option<SnapshotSink>,
}

impl DisplaySink for ViewerSink {
    fn render(&mut self, frame: &FrameView<'_>, x: i32, y: i32) -> spinnaker_camera::Result<()> {
        self.stats.render(frame, x, y)?;
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.render(frame, x, y)?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli_args = CliArgs::parse();

    // Setup logging
    spinnaker_camera::initialize(cli_args.verbose, cli_args.log_file.as_deref())?;

    // Load configuration
    let config = Config::load(&cli_args)?;
    if cli_args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    logging::log_app_config(&config);

    // Initialize camera
    let mut system = SimulatedSystem::from_config(&config.simulator);
    let mut session = new_session(&mut system, &config).context("Failed to set up camera")?;
    session.start().context("Failed to start acquisition")?;

    let mut sink = ViewerSink {
        stats: StatsSink::default(),
        snapshot: config.display.snapshot.as_ref().map(SnapshotSink::new),
    };
    let tick = Duration::from_secs_f32(1.0 / config.display.fps);
    let run_for = (config.display.duration_secs > 0.0).then(|| Duration::from_secs_f32(config.display.duration_secs));
    let started = Instant::now();
    let mut meter = RateMeter::default();

    // Render loop
    info!("Entering render loop");
    loop {
        let tick_start = Instant::now();

        let outcome = session.draw(&mut sink, config.display.x, config.display.y)?;
        if let Some(fps) = meter.tick() {
            let stats = session.stats();
            info!(
                "{:.1} fps | frame #{} | mean {:.1} | acquired {} incomplete {} errors {}",
                fps,
                sink.stats.last_sequence(),
                sink.stats.last_mean().unwrap_or(0.0),
                stats.acquired,
                stats.incomplete,
                stats.errors
            );
        }
        if outcome == DrawOutcome::NoFrame {
            warn!("Session has no frame buffer, leaving render loop");
            break;
        }

        if !session.is_acquiring() {
            warn!("Acquisition thread ended, leaving render loop");
            break;
        }
        if run_for.map_or(false, |limit| started.elapsed() >= limit) {
            break;
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick {
            thread::sleep(tick - elapsed);
        }
    }

    // Stop acquisition
    session.stop().context("Failed to stop acquisition")?;
    info!("Rendered {} frames", sink.stats.rendered());

    if let Some(snapshot) = &sink.snapshot {
        snapshot.save().context("Failed to save snapshot")?;
    }

    info!("Acquisition stopped, application shutting down");
    Ok(())
}
