use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::acquisition::AcquisitionConfig;
use crate::camera::config::is_positive;
use crate::camera::{CameraConfig, SimulatorConfig};
use crate::cli::CliArgs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub acquisition: AcquisitionConfig,
    pub display: DisplayConfig,
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render ticks per second.
    pub fps: f32,
    pub x: i32,
    pub y: i32,
    /// How long the viewer runs. 0 runs until the camera is lost.
    pub duration_secs: f32,
    /// Where to write the last rendered frame on exit.
    pub snapshot: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: 200.0,
            x: 0,
            y: 0,
            duration_secs: 5.0,
            snapshot: None,
        }
    }
}

impl Config {
    pub fn load(cli_args: &CliArgs) -> Result<Self> {
        let mut config = match cli_args.config.as_deref() {
            Some(path) => Self::from_file(Path::new(path))?,
            None => {
                info!("No configuration file given, using defaults");
                Self::default()
            }
        };

        config.override_with_cli_args(cli_args);
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&config_str).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn override_with_cli_args(&mut self, args: &CliArgs) {
        if let Some(index) = args.camera {
            self.camera.index = index;
        }
        if let Some(width) = args.width {
            self.camera.width = width;
        }
        if let Some(height) = args.height {
            self.camera.height = height;
        }
        if let Some(offset_x) = args.offset_x {
            self.camera.offset_x = offset_x;
        }
        if let Some(offset_y) = args.offset_y {
            self.camera.offset_y = offset_y;
        }
        if let Some(exposure) = args.exposure {
            self.camera.exposure = exposure;
        }
        if let Some(fps) = args.fps {
            self.camera.fps = fps;
        }
        if args.gain_auto {
            self.camera.gain_auto = true;
        }

        if let Some(display_fps) = args.display_fps {
            self.display.fps = display_fps;
        }
        if let Some(duration) = args.duration {
            self.display.duration_secs = duration;
        }
        if let Some(snapshot) = &args.snapshot {
            self.display.snapshot = Some(snapshot.clone());
        }

        if let Some(format) = args.pixel_format {
            self.simulator.pixel_format = format.into();
        }
        if let Some(every) = args.incomplete_every {
            self.simulator.incomplete_every = every;
        }
        if let Some(cameras) = args.cameras {
            self.simulator.cameras = cameras;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.camera
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid camera configuration")?;
        self.acquisition
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid acquisition configuration")?;
        self.simulator
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid simulator configuration")?;

        if !is_positive(self.display.fps) {
            return Err(anyhow::anyhow!("Display frame rate must be positive"));
        }
        if !(self.display.duration_secs.is_finite() && self.display.duration_secs >= 0.0) {
            return Err(anyhow::anyhow!("Display duration must be a finite, non-negative number of seconds"));
        }
        if let Some(snapshot) = &self.display.snapshot {
            if snapshot.is_empty() {
                return Err(anyhow::anyhow!("Snapshot path cannot be empty"));
            }
        }

        Ok(())
    }
}
