//! Camera SDK seam.
//!
//! The acquisition code only talks to these traits. A vendor binding
//! (Spinnaker, or anything else exposing GenICam-style features) implements
//! `CameraSystem` and `CameraDevice`; [`simulated`] provides a software camera.

pub mod config;
mod control;
pub mod simulated;

use crate::error::CameraError;
use crate::frame::RawImage;
use std::fmt;

pub use config::{CameraConfig, DEFAULT_CAM_H, DEFAULT_CAM_W};
pub use control::{configure_device, log_device_info};
pub use simulated::{AfterScript, CameraProbe, SimulatedCamera, SimulatedFrame, SimulatedSystem, SimulatorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub kind: u32,
    pub build: u32,
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.kind, self.build)
    }
}

/// Transport-layer "DeviceInformation" category, in device order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub features: Vec<(String, String)>,
}

impl DeviceInfo {
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.features.push((name.to_string(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.features
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn model(&self) -> &str {
        self.get("DeviceModelName").unwrap_or("unknown")
    }
}

/// Writable camera features used by the adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feature {
    AcquisitionModeContinuous,
    Width(u32),
    Height(u32),
    OffsetX(u32),
    OffsetY(u32),
    ExposureAuto(bool),
    /// Microseconds.
    ExposureTime(f32),
    GainAuto(bool),
    AcquisitionFrameRate(f32),
}

impl Feature {
    /// GenICam node name the feature maps to.
    pub fn node_name(&self) -> &'static str {
        match self {
            Feature::AcquisitionModeContinuous => "AcquisitionMode",
            Feature::Width(_) => "Width",
            Feature::Height(_) => "Height",
            Feature::OffsetX(_) => "OffsetX",
            Feature::OffsetY(_) => "OffsetY",
            Feature::ExposureAuto(_) => "ExposureAuto",
            Feature::ExposureTime(_) => "ExposureTime",
            Feature::GainAuto(_) => "GainAuto",
            Feature::AcquisitionFrameRate(_) => "AcquisitionFrameRate",
        }
    }
}

pub trait CameraSystem {
    fn library_version(&self) -> LibraryVersion;

    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, CameraError>;

    fn open(&mut self, index: usize) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// An opened camera. Moved onto the acquisition thread while streaming.
pub trait CameraDevice: Send {
    fn device_info(&self) -> Result<DeviceInfo, CameraError>;

    fn init(&mut self) -> Result<(), CameraError>;

    fn set_feature(&mut self, feature: Feature) -> Result<(), CameraError>;

    fn begin_acquisition(&mut self) -> Result<(), CameraError>;

    fn end_acquisition(&mut self) -> Result<(), CameraError>;

    /// Blocks until the next image is available. Incomplete images are
    /// returned as `Ok` with a non-complete status.
    fn next_image(&mut self) -> Result<RawImage, CameraError>;

    fn deinit(&mut self) -> Result<(), CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_lookup() {
        let info = DeviceInfo::default()
            .with("DeviceVendorName", "FLIR")
            .with("DeviceModelName", "Blackfly S BFS-U3-04S2M");
        assert_eq!(info.get("DeviceVendorName"), Some("FLIR"));
        assert_eq!(info.model(), "Blackfly S BFS-U3-04S2M");
        assert_eq!(info.get("DeviceSerialNumber"), None);
    }

    #[test]
    fn test_library_version_display() {
        let version = LibraryVersion { major: 1, minor: 29, kind: 0, build: 5 };
        assert_eq!(version.to_string(), "1.29.0.5");
    }
}
