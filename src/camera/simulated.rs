//! Software camera implementing the SDK traits.
//!
//! Frames come from a script queue first (see [`CameraProbe::push_frames`]),
//! then from a moving test pattern or an idle timeout.

use log::{debug, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::{CameraDevice, CameraSystem, DeviceInfo, Feature, LibraryVersion};
use super::config::{is_positive, DEFAULT_CAM_H, DEFAULT_CAM_W};
use crate::error::CameraError;
use crate::frame::{PixelFormat, RawImage};

const DEFAULT_SIM_FPS: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterScript {
    /// Generate the moving test pattern.
    Pattern,
    /// Wait one frame period, then fail the fetch with a timeout.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub cameras: usize,
    pub model: String,
    pub pixel_format: PixelFormat,
    /// Every n-th pattern frame is reported incomplete. 0 disables.
    pub incomplete_every: u32,
    /// Max additive noise per pixel.
    pub noise: u8,
    pub after_script: AfterScript,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            cameras: 1,
            model: "Simulated Mono Camera".to_string(),
            pixel_format: PixelFormat::Mono8,
            incomplete_every: 0,
            noise: 0,
            after_script: AfterScript::Pattern,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.is_empty() {
            return Err("Simulated camera model cannot be empty".to_string());
        }
        Ok(())
    }
}

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum SimulatedFrame {
    /// Complete frame, every pixel set to the value.
    Solid(u8),
    /// Incomplete frame carrying the status description.
    Incomplete(String),
    /// The fetch fails.
    Error(CameraError),
    /// Handed back verbatim.
    Raw(RawImage),
}

#[derive(Default)]
struct ProbeState {
    applied: Mutex<Vec<Feature>>,
    rejected: Mutex<Vec<String>>,
    script: Mutex<VecDeque<SimulatedFrame>>,
    initialized: AtomicBool,
    acquiring: AtomicBool,
    released: AtomicBool,
    unplugged: AtomicBool,
    fetches: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Observation and fault-injection handle on a simulated camera. Stays valid
/// while the camera itself is owned by the acquisition thread.
#[derive(Clone, Default)]
pub struct CameraProbe {
    state: Arc<ProbeState>,
}

impl CameraProbe {
    pub fn push_frames(&self, frames: impl IntoIterator<Item = SimulatedFrame>) {
        lock(&self.state.script).extend(frames);
    }

    pub fn reject_feature(&self, node_name: &str) {
        lock(&self.state.rejected).push(node_name.to_string());
    }

    pub fn applied_features(&self) -> Vec<Feature> {
        lock(&self.state.applied).clone()
    }

    /// Every subsequent fetch reports an invalid device session.
    pub fn unplug(&self) {
        self.state.unplugged.store(true, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst)
    }

    pub fn is_acquiring(&self) -> bool {
        self.state.acquiring.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> u64 {
        self.state.fetches.load(Ordering::SeqCst)
    }
}

pub struct SimulatedSystem {
    config: SimulatorConfig,
    cameras: Vec<Option<SimulatedCamera>>,
    probes: Vec<CameraProbe>,
}

impl SimulatedSystem {
    pub fn new(count: usize, config: SimulatorConfig) -> Self {
        let mut cameras = Vec::with_capacity(count);
        let mut probes = Vec::with_capacity(count);
        for index in 0..count {
            let probe = CameraProbe::default();
            cameras.push(Some(SimulatedCamera::new(index, &config, probe.clone())));
            probes.push(probe);
        }
        Self { config, cameras, probes }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(config.cameras, config.clone())
    }

    pub fn probe(&self, index: usize) -> Option<CameraProbe> {
        self.probes.get(index).cloned()
    }
}

impl CameraSystem for SimulatedSystem {
    fn library_version(&self) -> LibraryVersion {
        LibraryVersion { major: 0, minor: 1, kind: 0, build: 0 }
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, CameraError> {
        Ok((0..self.cameras.len())
            .map(|index| device_info_for(index, &self.config.model))
            .collect())
    }

    fn open(&mut self, index: usize) -> Result<Box<dyn CameraDevice>, CameraError> {
        let slot = self
            .cameras
            .get_mut(index)
            .ok_or_else(|| CameraError::sdk("GetByIndex", format!("invalid camera index: {}", index)))?;
        let camera = slot
            .take()
            .ok_or_else(|| CameraError::sdk("GetByIndex", format!("camera {} is already open", index)))?;
        Ok(Box::new(camera))
    }
}

fn device_info_for(index: usize, model: &str) -> DeviceInfo {
    DeviceInfo::default()
        .with("DeviceID", format!("SIM{:05}", index))
        .with("DeviceSerialNumber", format!("{:08}", 19_000_000 + index))
        .with("DeviceVendorName", "Simulated")
        .with("DeviceModelName", model)
        .with("DeviceVersion", env!("CARGO_PKG_VERSION"))
}

pub struct SimulatedCamera {
    index: usize,
    model: String,
    pixel_format: PixelFormat,
    incomplete_every: u32,
    noise: u8,
    after_script: AfterScript,
    probe: CameraProbe,
    width: u32,
    height: u32,
    fps: f32,
    started: Instant,
    last_frame: Option<Instant>,
}

impl SimulatedCamera {
    fn new(index: usize, config: &SimulatorConfig, probe: CameraProbe) -> Self {
        Self {
            index,
            model: config.model.clone(),
            pixel_format: config.pixel_format,
            incomplete_every: config.incomplete_every,
            noise: config.noise,
            after_script: config.after_script,
            probe,
            width: DEFAULT_CAM_W,
            height: DEFAULT_CAM_H,
            fps: DEFAULT_SIM_FPS,
            started: Instant::now(),
            last_frame: None,
        }
    }

    fn frame_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps.max(1.0))
    }

    fn wait_for_exposure(&mut self) {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            let period = self.frame_period();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
    }

    fn encode(&self, values: impl Iterator<Item = u8>) -> Vec<u8> {
        let len = self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel();
        let mut data = Vec::with_capacity(len);
        for v in values {
            match self.pixel_format {
                PixelFormat::Mono8 => data.push(v),
                PixelFormat::Mono16 => data.extend_from_slice(&(v as u16 * 257).to_le_bytes()),
                PixelFormat::Rgb8 | PixelFormat::Bgr8 => data.extend_from_slice(&[v, v, v]),
            }
        }
        data
    }

    fn solid(&self, value: u8, frame_id: u64) -> RawImage {
        let count = self.width as usize * self.height as usize;
        let data = self.encode(std::iter::repeat(value).take(count));
        RawImage::new(self.width, self.height, self.pixel_format, data)
            .with_frame_id(frame_id, self.timestamp_ns())
    }

    fn pattern(&self, frame_id: u64) -> RawImage {
        let (width, height) = (self.width as u64, self.height as u64);
        let noise = self.noise;
        let mut rng = rand::thread_rng();
        let shift = frame_id * 4;
        let values = (0..height).flat_map(move |y| (0..width).map(move |x| ((x + y + shift) % 256) as u8));
        let values: Vec<u8> = values
            .map(|v| if noise > 0 { v.saturating_add(rng.gen_range(0..=noise)) } else { v })
            .collect();
        RawImage::new(self.width, self.height, self.pixel_format, self.encode(values.into_iter()))
            .with_frame_id(frame_id, self.timestamp_ns())
    }

    fn timestamp_ns(&self) -> u64 {
        self.started.elapsed().as_nanos() as u64
    }
}

impl CameraDevice for SimulatedCamera {
    fn device_info(&self) -> Result<DeviceInfo, CameraError> {
        Ok(device_info_for(self.index, &self.model))
    }

    fn init(&mut self) -> Result<(), CameraError> {
        self.probe.state.initialized.store(true, Ordering::SeqCst);
        self.probe.state.released.store(false, Ordering::SeqCst);
        debug!("Simulated camera {} initialized", self.index);
        Ok(())
    }

    fn set_feature(&mut self, feature: Feature) -> Result<(), CameraError> {
        let name = feature.node_name();
        if !self.probe.is_initialized() {
            return Err(CameraError::sdk("SetValue", format!("{}: camera is not initialized", name)));
        }
        if lock(&self.probe.state.rejected).iter().any(|rejected| rejected == name) {
            return Err(CameraError::sdk("SetValue", format!("{} is not writable", name)));
        }

        let streaming = self.probe.is_acquiring();
        match feature {
            Feature::Width(_) | Feature::Height(_) | Feature::OffsetX(_) | Feature::OffsetY(_) if streaming => {
                return Err(CameraError::sdk("SetValue", format!("{} is locked while streaming", name)));
            }
            Feature::Width(0) | Feature::Height(0) => {
                return Err(CameraError::sdk("SetValue", format!("{} out of range", name)));
            }
            Feature::Width(width) => self.width = width,
            Feature::Height(height) => self.height = height,
            Feature::AcquisitionFrameRate(fps) if !is_positive(fps) => {
                return Err(CameraError::sdk("SetValue", format!("{} out of range", name)));
            }
            Feature::AcquisitionFrameRate(fps) => self.fps = fps,
            _ => {}
        }

        lock(&self.probe.state.applied).push(feature);
        Ok(())
    }

    fn begin_acquisition(&mut self) -> Result<(), CameraError> {
        if !self.probe.is_initialized() {
            return Err(CameraError::sdk("BeginAcquisition", "camera is not initialized"));
        }
        self.started = Instant::now();
        self.last_frame = None;
        self.probe.state.acquiring.store(true, Ordering::SeqCst);
        debug!("Simulated camera {} streaming at {} fps", self.index, self.fps);
        Ok(())
    }

    fn end_acquisition(&mut self) -> Result<(), CameraError> {
        if !self.probe.state.acquiring.swap(false, Ordering::SeqCst) {
            return Err(CameraError::sdk("EndAcquisition", "camera is not streaming"));
        }
        Ok(())
    }

    fn next_image(&mut self) -> Result<RawImage, CameraError> {
        if self.probe.state.unplugged.load(Ordering::SeqCst) {
            return Err(CameraError::session_invalid("camera was removed"));
        }
        if !self.probe.is_acquiring() {
            return Err(CameraError::sdk("GetNextImage", "camera is not streaming"));
        }

        self.wait_for_exposure();
        let frame_id = self.probe.state.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Simulated camera {} producing frame {}", self.index, frame_id);

        let scripted = lock(&self.probe.state.script).pop_front();
        match scripted {
            Some(SimulatedFrame::Solid(value)) => Ok(self.solid(value, frame_id)),
            Some(SimulatedFrame::Incomplete(description)) => Ok(self.pattern(frame_id).incomplete(description)),
            Some(SimulatedFrame::Error(e)) => Err(e),
            Some(SimulatedFrame::Raw(image)) => Ok(image),
            None => match self.after_script {
                AfterScript::Pattern => {
                    let image = self.pattern(frame_id);
                    if self.incomplete_every > 0 && frame_id % self.incomplete_every as u64 == 0 {
                        Ok(image.incomplete("Image data is incomplete (missing packets)"))
                    } else {
                        Ok(image)
                    }
                }
                AfterScript::Idle => Err(CameraError::sdk("GetNextImage", "Timeout waiting for image")),
            },
        }
    }

    fn deinit(&mut self) -> Result<(), CameraError> {
        self.probe.state.initialized.store(false, Ordering::SeqCst);
        self.probe.state.released.store(true, Ordering::SeqCst);
        debug!("Simulated camera {} released", self.index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming_camera(config: SimulatorConfig) -> (Box<dyn CameraDevice>, CameraProbe) {
        let mut system = SimulatedSystem::new(1, config);
        let mut camera = system.open(0).unwrap();
        let probe = system.probe(0).unwrap();
        camera.init().unwrap();
        camera.set_feature(Feature::Width(8)).unwrap();
        camera.set_feature(Feature::Height(4)).unwrap();
        camera.set_feature(Feature::AcquisitionFrameRate(1000.0)).unwrap();
        camera.begin_acquisition().unwrap();
        (camera, probe)
    }

    #[test]
    fn test_enumerate_and_open_once() {
        let mut system = SimulatedSystem::new(2, SimulatorConfig::default());
        let devices = system.enumerate().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].get("DeviceID"), Some("SIM00001"));

        assert!(system.open(1).is_ok());
        assert!(system.open(1).is_err());
        assert!(system.open(5).is_err());
    }

    #[test]
    fn test_script_then_pattern() {
        let (mut camera, probe) = streaming_camera(SimulatorConfig::default());
        probe.push_frames([
            SimulatedFrame::Incomplete("missing packets".to_string()),
            SimulatedFrame::Solid(128),
        ]);

        let first = camera.next_image().unwrap();
        assert!(first.is_incomplete());

        let second = camera.next_image().unwrap();
        assert!(!second.is_incomplete());
        assert_eq!(second.data, vec![128; 32]);
        assert_eq!(second.frame_id, 2);

        let third = camera.next_image().unwrap();
        assert_eq!((third.width, third.height), (8, 4));
        assert_eq!(third.data.len(), 32);
        assert_eq!(probe.fetch_count(), 3);
    }

    #[test]
    fn test_periodic_incomplete_frames() {
        let config = SimulatorConfig {
            incomplete_every: 2,
            ..SimulatorConfig::default()
        };
        let (mut camera, _probe) = streaming_camera(config);
        let flags: Vec<bool> = (0..4).map(|_| camera.next_image().unwrap().is_incomplete()).collect();
        assert_eq!(flags, vec![false, true, false, true]);
    }

    #[test]
    fn test_rgb_encoding() {
        let config = SimulatorConfig {
            pixel_format: PixelFormat::Rgb8,
            ..SimulatorConfig::default()
        };
        let (mut camera, probe) = streaming_camera(config);
        probe.push_frames([SimulatedFrame::Solid(9)]);
        let image = camera.next_image().unwrap();
        assert_eq!(image.pixel_format, PixelFormat::Rgb8);
        assert_eq!(image.data.len(), 8 * 4 * 3);
    }

    #[test]
    fn test_idle_and_unplug() {
        let config = SimulatorConfig {
            after_script: AfterScript::Idle,
            ..SimulatorConfig::default()
        };
        let (mut camera, probe) = streaming_camera(config);
        assert!(matches!(camera.next_image(), Err(CameraError::Sdk { .. })));

        probe.unplug();
        let err = camera.next_image().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_roi_locked_while_streaming() {
        let (mut camera, _probe) = streaming_camera(SimulatorConfig::default());
        assert!(camera.set_feature(Feature::Width(16)).is_err());
        assert!(camera.set_feature(Feature::ExposureTime(100.0)).is_ok());
    }

    #[test]
    fn test_lifecycle_flags() {
        let (mut camera, probe) = streaming_camera(SimulatorConfig::default());
        assert!(probe.is_acquiring());
        camera.end_acquisition().unwrap();
        assert!(camera.end_acquisition().is_err());
        assert!(camera.next_image().is_err());
        camera.deinit().unwrap();
        assert!(probe.is_released());
        assert!(!probe.is_initialized());
    }
}
