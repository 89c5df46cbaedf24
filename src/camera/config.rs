use serde::{Deserialize, Serialize};

pub const DEFAULT_CAM_W: u32 = 720;
pub const DEFAULT_CAM_H: u32 = 540;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Index into the enumerated camera list.
    pub index: usize,
    pub fps: f32,
    /// Exposure time in microseconds.
    pub exposure: f32,
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub gain_auto: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            fps: 200.0,
            exposure: 5000.0,
            width: DEFAULT_CAM_W,
            height: DEFAULT_CAM_H,
            offset_x: 0,
            offset_y: 0,
            gain_auto: false,
        }
    }
}

impl CameraConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_offset(mut self, offset_x: u32, offset_y: u32) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    pub fn with_gain_auto(mut self, gain_auto: bool) -> Self {
        self.gain_auto = gain_auto;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !is_positive(self.fps) {
            return Err("FPS must be greater than 0".to_string());
        }
        if !is_positive(self.exposure) {
            return Err("Exposure must be greater than 0".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("Width and height must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Exposure clamped so that it fits into one frame period.
    pub fn adjusted_exposure(&self) -> f32 {
        let max_exposure_for_fps = 1_000_000.0 / self.fps;
        if self.exposure > max_exposure_for_fps {
            max_exposure_for_fps - 1.0
        } else {
            self.exposure
        }
    }
}

/// Finite and strictly positive; NaN fails.
pub fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
