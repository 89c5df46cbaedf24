use anyhow::Result;
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use log::{debug, info, LevelFilter};
use std::io;

use crate::config::Config;

pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn setup_logging(verbosity: u8, log_file: Option<&str>) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let mut base_config = fern::Dispatch::new().level(level_for(verbosity));

    // File logs carry the full date, stdout only the time of day
    let file_config = fern::Dispatch::new().format(|out, message, record| {
        out.finish(format_args!(
            "{}[{}][{}] {}",
            Local::now().format("[%Y-%m-%d][%H:%M:%S%.3f]"),
            record.target(),
            record.level(),
            message
        ))
    });

    let stdout_config = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                Local::now().format("[%H:%M:%S]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .chain(io::stdout());

    base_config = base_config.chain(stdout_config);

    if let Some(log_file) = log_file {
        base_config = base_config.chain(file_config.chain(fern::log_file(log_file)?));
    }

    base_config.apply()?;

    debug!("Logging system initialized");
    Ok(())
}

pub fn log_app_start(version: &str) {
    info!("Starting Spinnaker Camera Viewer v{}", version);
}

pub fn log_app_config(config: &Config) {
    info!("Application configured with:");
    info!("  Camera:");
    info!("    Index: {}", config.camera.index);
    info!("    FPS: {}", config.camera.fps);
    info!("    Exposure: {} µs", config.camera.exposure);
    info!("    Gain auto: {}", config.camera.gain_auto);
    info!("    Resolution: {}x{}", config.camera.width, config.camera.height);
    info!("    Offset: ({}, {})", config.camera.offset_x, config.camera.offset_y);
    info!("  Acquisition:");
    info!("    Idle sleep: {} ms", config.acquisition.idle_sleep_ms);
    info!("    Stop timeout: {} ms", config.acquisition.stop_timeout_ms);
    info!("  Display:");
    info!("    FPS: {}", config.display.fps);
    info!("    Position: ({}, {})", config.display.x, config.display.y);
    info!("    Duration: {} s", config.display.duration_secs);
    if let Some(snapshot) = &config.display.snapshot {
        info!("    Snapshot: {}", snapshot);
    }
    info!("  Simulator:");
    info!("    Cameras: {}", config.simulator.cameras);
    info!("    Pixel format: {:?}", config.simulator.pixel_format);
    info!("    Incomplete every: {}", config.simulator.incomplete_every);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Info);
        assert_eq!(level_for(1), LevelFilter::Debug);
        assert_eq!(level_for(2), LevelFilter::Trace);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }
}
