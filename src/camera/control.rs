use log::{debug, error, info};

use super::{CameraConfig, CameraDevice, DeviceInfo, Feature};
use crate::error::CameraError;

/// Initializes the device and pushes the session configuration.
///
/// Each feature is applied on its own, so a rejected node (for example an
/// unsupported frame rate) leaves the others in place. Failures are logged
/// and returned; the device stays usable in a degraded state.
pub fn configure_device(device: &mut dyn CameraDevice, config: &CameraConfig) -> Vec<CameraError> {
    debug!("Configuring camera parameters");
    let mut failures = Vec::new();

    if let Err(e) = device.init() {
        error!("Failed to initialize camera: {}", e);
        failures.push(e);
    }

    let features = [
        Feature::AcquisitionModeContinuous,
        Feature::Width(config.width),
        Feature::Height(config.height),
        Feature::OffsetX(config.offset_x),
        Feature::OffsetY(config.offset_y),
        Feature::ExposureAuto(false),
        Feature::ExposureTime(config.adjusted_exposure()),
        Feature::GainAuto(config.gain_auto),
        Feature::AcquisitionFrameRate(config.fps),
    ];

    for feature in features {
        match device.set_feature(feature) {
            Ok(()) => debug!("{} set to {:?}", feature.node_name(), feature),
            Err(e) => {
                error!("Error: failed to set {}: {}", feature.node_name(), e);
                failures.push(e);
            }
        }
    }

    if failures.is_empty() {
        info!(
            "Camera configuration complete: {}x{} at ({}, {}), exposure {} µs, {} fps",
            config.width,
            config.height,
            config.offset_x,
            config.offset_y,
            config.adjusted_exposure(),
            config.fps
        );
    } else {
        info!("Camera configured with {} failed feature(s)", failures.len());
    }
    failures
}

pub fn log_device_info(device_info: &DeviceInfo) {
    if device_info.features.is_empty() {
        info!("*** DEVICE INFORMATION ***");
        info!("Device control information not available.");
        return;
    }
    info!("*** DEVICE INFORMATION ({}) ***", device_info.model());
    for (name, value) in &device_info.features {
        info!("{} : {}", name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSystem, SimulatedSystem, SimulatorConfig};

    #[test]
    fn test_all_features_pushed_in_order() {
        let mut system = SimulatedSystem::new(1, SimulatorConfig::default());
        let mut device = system.open(0).unwrap();
        let probe = system.probe(0).unwrap();

        let config = CameraConfig::default().with_resolution(320, 240).with_offset(80, 0);
        let failures = configure_device(device.as_mut(), &config);
        assert!(failures.is_empty());

        let applied = probe.applied_features();
        assert_eq!(applied.first(), Some(&Feature::AcquisitionModeContinuous));
        assert!(applied.contains(&Feature::Width(320)));
        assert!(applied.contains(&Feature::Height(240)));
        assert!(applied.contains(&Feature::OffsetX(80)));
        assert!(applied.contains(&Feature::ExposureAuto(false)));
        assert!(applied.contains(&Feature::GainAuto(false)));
        assert!(probe.is_initialized());
    }

    #[test]
    fn test_rejected_feature_does_not_stop_the_rest() {
        let mut system = SimulatedSystem::new(1, SimulatorConfig::default());
        let mut device = system.open(0).unwrap();
        let probe = system.probe(0).unwrap();
        probe.reject_feature("AcquisitionFrameRate");

        let config = CameraConfig::default().with_fps(10_000.0);
        let failures = configure_device(device.as_mut(), &config);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], CameraError::Sdk { .. }));
        assert!(probe.applied_features().contains(&Feature::Width(720)));
    }
}
