//! A library for streaming a machine-vision camera into a render loop.
//!
//! This library provides functionality for:
//! - Configuring a camera through an SDK-agnostic device trait
//! - Acquiring frames continuously on a background thread
//! - Publishing the latest complete Mono8 frame behind a single lock
//! - Rendering that frame from the display thread without holding the lock

pub mod acquisition;
pub mod camera;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod frame;
pub mod helpers;
pub mod logging;
pub mod session;

pub use acquisition::{AcquisitionConfig, AcquisitionWorker, StatsSnapshot};
pub use camera::{CameraConfig, CameraDevice, CameraSystem, SimulatedSystem};
pub use config::Config;
pub use display::{DisplaySink, DrawOutcome};
pub use error::{AppError, CameraError, Result};
pub use frame::{FrameView, SharedFrameBuffer};
pub use session::{CameraSession, SessionState};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
///
/// Sets up logging and announces the library version. Call once, before
/// opening a session.
///
/// # Arguments
///
/// * `verbosity` - 0 for info, 1 for debug, 2 or more for trace
/// * `log_file` - Optional path to a log file. If None, logs only go to stdout.
pub fn initialize(verbosity: u8, log_file: Option<&str>) -> anyhow::Result<()> {
    logging::setup_logging(verbosity, log_file)?;
    logging::log_app_start(VERSION);
    Ok(())
}

/// A convenience function to set up a session on the given camera system
///
/// # Returns
///
/// A `Configured` session, or the error that kept it `Uninitialized`.
pub fn new_session(system: &mut dyn CameraSystem, config: &Config) -> std::result::Result<CameraSession, CameraError> {
    let mut session = CameraSession::new(config.acquisition.clone());
    session.setup(system, &config.camera)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty(), "Version should not be empty");
    }

    #[test]
    fn test_new_session_is_configured() {
        let config = Config::default();
        let mut system = SimulatedSystem::from_config(&config.simulator);
        let session = new_session(&mut system, &config).unwrap();
        assert_eq!(session.state(), SessionState::Configured);
        assert_eq!((session.width(), session.height()), (720, 540));
    }
}
