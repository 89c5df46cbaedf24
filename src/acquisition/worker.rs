use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::stats::{AcquisitionStats, StatsSnapshot};
use crate::camera::{CameraDevice, Feature};
use crate::error::CameraError;
use crate::frame::{FrameProcessor, ImageStatus, SharedFrameBuffer};

/// Feature changes requested while the device lives on the worker thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCommand {
    SetFrameRate(f32),
    /// Microseconds.
    SetExposure(f32),
}

impl DeviceCommand {
    pub fn feature(self) -> Feature {
        match self {
            DeviceCommand::SetFrameRate(fps) => Feature::AcquisitionFrameRate(fps),
            DeviceCommand::SetExposure(us) => Feature::ExposureTime(us),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Published(u64),
    Incomplete,
    Malformed,
    DeviceError,
    /// The device session is gone; the loop must exit.
    Fatal,
}

/// One fetch-convert-publish cycle over an owned device.
pub struct AcquisitionLoop {
    device: Box<dyn CameraDevice>,
    buffer: SharedFrameBuffer,
    stats: Arc<AcquisitionStats>,
    commands: Receiver<DeviceCommand>,
}

impl AcquisitionLoop {
    pub fn new(
        device: Box<dyn CameraDevice>,
        buffer: SharedFrameBuffer,
        stats: Arc<AcquisitionStats>,
        commands: Receiver<DeviceCommand>,
    ) -> Self {
        Self {
            device,
            buffer,
            stats,
            commands,
        }
    }

    fn apply_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    let feature = command.feature();
                    match self.device.set_feature(feature) {
                        Ok(()) => info!("{} set to {:?}", feature.node_name(), feature),
                        Err(e) => error!("Error: {}", e),
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn step(&mut self) -> StepOutcome {
        self.apply_commands();

        let raw = match self.device.next_image() {
            Ok(raw) => raw,
            Err(e) if e.is_fatal() => {
                error!("Error: {}", e);
                self.stats.record_error();
                return StepOutcome::Fatal;
            }
            Err(e) => {
                error!("Error: {}", e);
                self.stats.record_error();
                return StepOutcome::DeviceError;
            }
        };

        if let ImageStatus::Incomplete(description) = &raw.status {
            warn!("Image incomplete: {}...", description);
            self.stats.record_incomplete();
            return StepOutcome::Incomplete;
        }

        if raw.width != self.buffer.width() || raw.height != self.buffer.height() {
            warn!(
                "Dropping frame {}: {}x{} does not match configured {}x{}",
                raw.frame_id,
                raw.width,
                raw.height,
                self.buffer.width(),
                self.buffer.height()
            );
            self.stats.record_malformed();
            return StepOutcome::Malformed;
        }

        let published = FrameProcessor::to_mono8(&raw)
            .and_then(|pixels| self.buffer.publish(&pixels, raw.frame_id, raw.timestamp_ns));
        match published {
            Ok(sequence) => {
                trace!("Published frame {} as #{}", raw.frame_id, sequence);
                self.stats.record_acquired();
                StepOutcome::Published(sequence)
            }
            Err(e) => {
                warn!("Dropping frame {}: {}", raw.frame_id, e);
                self.stats.record_malformed();
                StepOutcome::Malformed
            }
        }
    }

    pub fn into_device(self) -> Box<dyn CameraDevice> {
        self.device
    }
}

/// Ends acquisition and deinitializes the device, logging failures.
pub fn release_device(device: &mut dyn CameraDevice) {
    if let Err(e) = device.end_acquisition() {
        warn!("Failed to end acquisition: {}", e);
    }
    if let Err(e) = device.deinit() {
        warn!("Failed to release camera: {}", e);
    }
}

/// A streaming device the worker could not take over.
pub struct SpawnError {
    pub error: CameraError,
    /// `None` only if the device was lost along with the thread closure.
    pub device: Option<Box<dyn CameraDevice>>,
}

impl std::fmt::Debug for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnError")
            .field("error", &self.error)
            .field("device", &self.device.as_ref().map(|_| "<dyn CameraDevice>"))
            .finish()
    }
}

/// Owns the acquisition thread: its running flag, join handle and command queue.
pub struct AcquisitionWorker {
    running: Arc<AtomicBool>,
    // set by whichever side lets go of the device first: the thread on exit,
    // or `stop`/`drop` when giving up on the thread
    handed_off: Arc<AtomicBool>,
    handle: Option<JoinHandle<Option<Box<dyn CameraDevice>>>>,
    done: Receiver<()>,
    commands: Sender<DeviceCommand>,
    stats: Arc<AcquisitionStats>,
}

impl AcquisitionWorker {
    /// Launches the producer thread. The device must already be streaming.
    pub fn spawn(device: Box<dyn CameraDevice>, buffer: SharedFrameBuffer, idle: Duration) -> Result<Self, SpawnError> {
        let builder = thread::Builder::new().name("acquisition".to_string());
        Self::spawn_with(builder, device, buffer, idle)
    }

    pub(crate) fn spawn_with(
        builder: thread::Builder,
        device: Box<dyn CameraDevice>,
        buffer: SharedFrameBuffer,
        idle: Duration,
    ) -> Result<Self, SpawnError> {
        let running = Arc::new(AtomicBool::new(true));
        let handed_off = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(AcquisitionStats::default());
        let (command_tx, command_rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);

        // the device travels through a channel so a failed spawn can hand it back
        let (device_tx, device_rx) = bounded::<Box<dyn CameraDevice>>(1);
        let retained = device_rx.clone();
        if let Err(e) = device_tx.send(device) {
            return Err(SpawnError {
                error: CameraError::worker("failed to hand device to acquisition thread"),
                device: Some(e.into_inner()),
            });
        }

        let flag = Arc::clone(&running);
        let thread_handed_off = Arc::clone(&handed_off);
        let thread_stats = Arc::clone(&stats);
        let spawned = builder.spawn(move || {
            let device = device_rx.recv().ok()?;
            let mut acquisition = AcquisitionLoop::new(device, buffer, thread_stats, command_rx);
            debug!("Acquisition thread started");
            while flag.load(Ordering::Acquire) {
                if acquisition.step() == StepOutcome::Fatal {
                    error!("Device session lost, acquisition thread exiting");
                    break;
                }
                thread::sleep(idle);
            }
            flag.store(false, Ordering::Release);

            let mut device = acquisition.into_device();
            if thread_handed_off.swap(true, Ordering::AcqRel) {
                warn!("Acquisition thread was detached, releasing the camera itself");
                release_device(device.as_mut());
            }
            let _ = done_tx.send(());
            debug!("Acquisition thread finished");
            Some(device)
        });

        match spawned {
            Ok(handle) => Ok(Self {
                running,
                handed_off,
                handle: Some(handle),
                done: done_rx,
                commands: command_tx,
                stats,
            }),
            Err(e) => {
                error!("Failed to spawn acquisition thread: {}", e);
                Err(SpawnError {
                    error: CameraError::worker(format!("failed to spawn acquisition thread: {}", e)),
                    device: retained.try_recv().ok(),
                })
            }
        }
    }

    /// False once stop was requested or the loop exited on its own.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn send(&self, command: DeviceCommand) -> Result<(), CameraError> {
        self.commands
            .send(command)
            .map_err(|_| CameraError::worker("acquisition thread is gone"))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Clears the running flag and waits at most `timeout` for the thread to
    /// finish, handing the device back.
    ///
    /// On timeout the thread is detached and releases the device itself once
    /// its current fetch returns.
    pub fn stop(mut self, timeout: Duration) -> Result<Box<dyn CameraDevice>, CameraError> {
        let started = Instant::now();
        self.running.store(false, Ordering::Release);

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                if !self.handed_off.swap(true, Ordering::AcqRel) {
                    warn!("Acquisition thread still busy after {:?}, detaching it", timeout);
                    self.handle = None;
                    return Err(CameraError::StopTimeout(timeout.as_millis() as u64));
                }
                // the thread finished between the timeout and the hand-off; join it
            }
        }

        let handle = self
            .handle
            .take()
            .ok_or_else(|| CameraError::worker("acquisition thread already joined"))?;
        let device = handle
            .join()
            .map_err(|_| CameraError::worker("acquisition thread panicked"))?
            .ok_or_else(|| CameraError::worker("acquisition thread never received the device"))?;
        debug!("Acquisition thread joined in {:?}", started.elapsed());
        Ok(device)
    }
}

impl Drop for AcquisitionWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if self.handed_off.swap(true, Ordering::AcqRel) {
                if let Ok(Some(mut device)) = handle.join() {
                    release_device(device.as_mut());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraProbe, CameraSystem, SimulatedFrame, SimulatedSystem, SimulatorConfig};
    use crate::camera::AfterScript;
    use crate::frame::{PixelFormat, RawImage};

    fn streaming_device(width: u32, height: u32, after_script: AfterScript) -> (Box<dyn CameraDevice>, CameraProbe) {
        let config = SimulatorConfig {
            after_script,
            ..SimulatorConfig::default()
        };
        let mut system = SimulatedSystem::new(1, config);
        let mut device = system.open(0).unwrap();
        let probe = system.probe(0).unwrap();
        device.init().unwrap();
        device.set_feature(Feature::Width(width)).unwrap();
        device.set_feature(Feature::Height(height)).unwrap();
        device.set_feature(Feature::AcquisitionFrameRate(2000.0)).unwrap();
        device.begin_acquisition().unwrap();
        (device, probe)
    }

    fn acquisition_loop(device: Box<dyn CameraDevice>, buffer: &SharedFrameBuffer) -> (AcquisitionLoop, Sender<DeviceCommand>) {
        let (tx, rx) = unbounded();
        let stats = Arc::new(AcquisitionStats::default());
        (AcquisitionLoop::new(device, buffer.clone(), stats, rx), tx)
    }

    #[test]
    fn test_step_outcomes() {
        let (device, probe) = streaming_device(4, 2, AfterScript::Idle);
        let buffer = SharedFrameBuffer::new(4, 2);
        let (mut acquisition, _tx) = acquisition_loop(device, &buffer);

        probe.push_frames([
            SimulatedFrame::Incomplete("missing packets".to_string()),
            SimulatedFrame::Solid(42),
            SimulatedFrame::Raw(RawImage::new(2, 4, PixelFormat::Mono8, vec![1; 8])),
            SimulatedFrame::Error(CameraError::sdk("GetNextImage", "transfer error")),
        ]);

        assert_eq!(acquisition.step(), StepOutcome::Incomplete);
        assert_eq!(buffer.info().sequence, 0);
        assert_eq!(acquisition.step(), StepOutcome::Published(1));
        assert_eq!(acquisition.step(), StepOutcome::Malformed);
        assert_eq!(acquisition.step(), StepOutcome::DeviceError);
        assert_eq!(acquisition.step(), StepOutcome::DeviceError);

        assert_eq!(buffer.snapshot().into_raw(), vec![42; 8]);
        let stats = acquisition.stats.snapshot();
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.incomplete, 1);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.errors, 2);
    }

    #[test]
    fn test_fatal_error_ends_loop() {
        let (device, probe) = streaming_device(4, 2, AfterScript::Pattern);
        let buffer = SharedFrameBuffer::new(4, 2);
        let (mut acquisition, _tx) = acquisition_loop(device, &buffer);

        probe.unplug();
        assert_eq!(acquisition.step(), StepOutcome::Fatal);
    }

    #[test]
    fn test_commands_applied_between_frames() {
        let (device, probe) = streaming_device(4, 2, AfterScript::Pattern);
        let buffer = SharedFrameBuffer::new(4, 2);
        let (mut acquisition, tx) = acquisition_loop(device, &buffer);

        tx.send(DeviceCommand::SetExposure(1234.0)).unwrap();
        tx.send(DeviceCommand::SetFrameRate(1500.0)).unwrap();
        acquisition.step();

        let applied = probe.applied_features();
        assert!(applied.contains(&Feature::ExposureTime(1234.0)));
        assert!(applied.contains(&Feature::AcquisitionFrameRate(1500.0)));
    }

    #[test]
    fn test_worker_stops_and_returns_device() {
        let (device, probe) = streaming_device(8, 8, AfterScript::Pattern);
        let buffer = SharedFrameBuffer::new(8, 8);
        let worker = AcquisitionWorker::spawn(device, buffer.clone(), Duration::from_millis(1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while buffer.info().sequence < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(worker.is_running());
        assert!(worker.stats().acquired >= 3);

        let started = Instant::now();
        let mut device = worker.stop(Duration::from_secs(2)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(probe.is_acquiring());
        device.end_acquisition().unwrap();

        let frozen = buffer.info().sequence;
        thread::sleep(Duration::from_millis(20));
        assert_eq!(buffer.info().sequence, frozen);
    }

    #[test]
    fn test_worker_exits_on_unplug() {
        let (device, probe) = streaming_device(8, 8, AfterScript::Pattern);
        let buffer = SharedFrameBuffer::new(8, 8);
        let worker = AcquisitionWorker::spawn(device, buffer, Duration::from_millis(1)).unwrap();

        probe.unplug();
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!worker.is_running());
        assert!(worker.stop(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_failed_spawn_hands_device_back() {
        let (device, probe) = streaming_device(8, 8, AfterScript::Pattern);
        let buffer = SharedFrameBuffer::new(8, 8);
        let builder = thread::Builder::new().stack_size(isize::MAX as usize);

        let failed = match AcquisitionWorker::spawn_with(builder, device, buffer.clone(), Duration::from_millis(1)) {
            Ok(_) => panic!("spawn should fail with an oversized stack"),
            Err(failed) => failed,
        };
        assert!(matches!(failed.error, CameraError::Worker(_)));
        let mut device = failed.device.unwrap();
        assert!(probe.is_acquiring());
        assert!(device.next_image().is_ok());
        assert_eq!(buffer.info().sequence, 0);
    }

    #[test]
    fn test_dropped_worker_releases_device() {
        let (device, probe) = streaming_device(8, 8, AfterScript::Pattern);
        let worker = AcquisitionWorker::spawn(device, SharedFrameBuffer::new(8, 8), Duration::from_millis(1)).unwrap();
        drop(worker);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !probe.is_released() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(probe.is_released());
        assert!(!probe.is_acquiring());
    }
}
