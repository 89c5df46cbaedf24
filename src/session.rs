//! Camera session lifecycle.
//!
//! `Uninitialized -> Configured -> Acquiring -> Stopped`, no skips and no
//! way back. While `Configured` the session owns the device; while
//! `Acquiring` the device lives on the acquisition thread and feature
//! changes are forwarded as [`DeviceCommand`]s.

use image::GrayImage;
use log::{error, info, warn};
use serde::Serialize;

use crate::acquisition::{release_device, AcquisitionConfig, AcquisitionWorker, DeviceCommand, SpawnError, StatsSnapshot};
use crate::camera::{configure_device, log_device_info, CameraConfig, CameraDevice, CameraSystem};
use crate::display::{DisplaySink, DrawOutcome, Presenter};
use crate::error::{AppError, CameraError};
use crate::frame::SharedFrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Uninitialized,
    Configured,
    Acquiring,
    Stopped,
}

pub struct CameraSession {
    state: SessionState,
    config: CameraConfig,
    acquisition: AcquisitionConfig,
    device: Option<Box<dyn CameraDevice>>,
    worker: Option<AcquisitionWorker>,
    presenter: Option<Presenter>,
    last_stats: StatsSnapshot,
    degraded: Vec<CameraError>,
}

impl CameraSession {
    pub fn new(acquisition: AcquisitionConfig) -> Self {
        Self {
            state: SessionState::Uninitialized,
            config: CameraConfig::default(),
            acquisition,
            device: None,
            worker: None,
            presenter: None,
            last_stats: StatsSnapshot::default(),
            degraded: Vec::new(),
        }
    }

    fn transition(&self, expected: SessionState, to: SessionState) -> Result<(), CameraError> {
        if self.state != expected {
            return Err(CameraError::InvalidTransition { from: self.state, to });
        }
        Ok(())
    }

    pub fn setup_default(&mut self, system: &mut dyn CameraSystem) -> Result<(), CameraError> {
        self.setup(system, &CameraConfig::default())
    }

    /// Opens the configured camera, pushes resolution, exposure and gain,
    /// and allocates the frame buffer.
    ///
    /// Fails with `NoDevice` when nothing is connected, leaving the session
    /// `Uninitialized`. Rejected features only degrade the session; they are
    /// available from [`CameraSession::degraded_features`].
    pub fn setup(&mut self, system: &mut dyn CameraSystem, config: &CameraConfig) -> Result<(), CameraError> {
        self.transition(SessionState::Uninitialized, SessionState::Configured)?;
        config.validate().map_err(CameraError::configuration)?;

        info!("Camera library version: {}", system.library_version());
        let devices = system.enumerate()?;
        info!("Number of cameras detected: {}", devices.len());
        if devices.is_empty() {
            error!("Not enough cameras!");
            return Err(CameraError::NoDevice);
        }
        if config.index >= devices.len() {
            return Err(CameraError::configuration(format!(
                "camera index {} out of range, {} detected",
                config.index,
                devices.len()
            )));
        }

        let mut device = system.open(config.index)?;
        match device.device_info() {
            Ok(device_info) => log_device_info(&device_info),
            Err(e) => error!("Error: {}", e),
        }
        self.degraded = configure_device(device.as_mut(), config);

        let buffer = SharedFrameBuffer::new(config.width, config.height);
        self.presenter = Some(Presenter::new(buffer));
        self.device = Some(device);
        self.config = config.clone();
        self.state = SessionState::Configured;
        info!("Camera session configured ({}x{})", config.width, config.height);
        Ok(())
    }

    /// Begins device acquisition and launches the producer thread.
    pub fn start(&mut self) -> Result<(), CameraError> {
        self.start_with(std::thread::Builder::new().name("acquisition".to_string()))
    }

    fn start_with(&mut self, builder: std::thread::Builder) -> Result<(), CameraError> {
        self.transition(SessionState::Configured, SessionState::Acquiring)?;
        let (mut device, buffer) = match (self.device.take(), self.presenter.as_ref()) {
            (Some(device), Some(presenter)) => (device, presenter.buffer().clone()),
            (device, _) => {
                self.device = device;
                return Err(CameraError::worker("session has no device"));
            }
        };

        if let Err(e) = device.begin_acquisition() {
            self.device = Some(device);
            return Err(e);
        }

        match AcquisitionWorker::spawn_with(builder, device, buffer, self.acquisition.idle_sleep()) {
            Ok(worker) => {
                self.worker = Some(worker);
                self.state = SessionState::Acquiring;
                info!("Acquisition started");
                Ok(())
            }
            Err(SpawnError { error, device }) => {
                if let Some(mut device) = device {
                    if let Err(e) = device.end_acquisition() {
                        warn!("Failed to end acquisition: {}", e);
                    }
                    self.device = Some(device);
                }
                Err(error)
            }
        }
    }

    /// Stops the producer within the configured timeout, ends acquisition and
    /// releases the device. The buffer keeps its last published frame.
    ///
    /// A thread that misses the timeout is detached and `StopTimeout` is
    /// returned; the session is `Stopped` either way and the thread releases
    /// the device when its fetch returns.
    pub fn stop(&mut self) -> Result<(), CameraError> {
        self.transition(SessionState::Acquiring, SessionState::Stopped)?;
        self.state = SessionState::Stopped;

        let worker = self
            .worker
            .take()
            .ok_or_else(|| CameraError::worker("acquisition thread missing"))?;
        self.last_stats = worker.stats();

        let mut device = worker.stop(self.acquisition.stop_timeout())?;
        release_device(device.as_mut());
        info!(
            "Acquisition stopped: {} frames, {} incomplete, {} malformed, {} errors",
            self.last_stats.acquired, self.last_stats.incomplete, self.last_stats.malformed, self.last_stats.errors
        );
        Ok(())
    }

    /// Renders the latest frame. Before setup this is a no-op returning
    /// `DrawOutcome::NoFrame`.
    pub fn draw(&mut self, sink: &mut dyn DisplaySink, x: i32, y: i32) -> Result<DrawOutcome, AppError> {
        match self.presenter.as_mut() {
            Some(presenter) => presenter.draw(sink, x, y),
            None => Ok(DrawOutcome::NoFrame),
        }
    }

    /// Owned copy of the latest frame.
    pub fn latest_image(&self) -> Option<GrayImage> {
        self.presenter.as_ref().map(|presenter| presenter.buffer().snapshot())
    }

    pub fn set_frame_rate(&mut self, fps: f32) -> Result<(), CameraError> {
        self.apply(DeviceCommand::SetFrameRate(fps))?;
        self.config.fps = fps;
        Ok(())
    }

    /// Exposure in microseconds.
    pub fn set_exposure(&mut self, exposure_us: f32) -> Result<(), CameraError> {
        self.apply(DeviceCommand::SetExposure(exposure_us))?;
        self.config.exposure = exposure_us;
        Ok(())
    }

    fn apply(&mut self, command: DeviceCommand) -> Result<(), CameraError> {
        match (self.state, self.device.as_mut(), self.worker.as_ref()) {
            (SessionState::Configured, Some(device), _) => device.set_feature(command.feature()),
            (SessionState::Acquiring, _, Some(worker)) => worker.send(command),
            (state, _, _) => Err(CameraError::NotActive(state)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Configured | SessionState::Acquiring)
    }

    /// False when the acquisition thread exited on its own (lost device).
    pub fn is_acquiring(&self) -> bool {
        self.worker.as_ref().map(|worker| worker.is_running()).unwrap_or(false)
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn frame_buffer(&self) -> Option<&SharedFrameBuffer> {
        self.presenter.as_ref().map(|presenter| presenter.buffer())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.worker
            .as_ref()
            .map(|worker| worker.stats())
            .unwrap_or(self.last_stats)
    }

    pub fn degraded_features(&self) -> &[CameraError] {
        &self.degraded
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        if self.state == SessionState::Acquiring {
            if let Err(e) = self.stop() {
                error!("Failed to stop acquisition on session drop: {}", e);
            }
        }
    }
}
