use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("No camera detected")]
    NoDevice,

    #[error("Image incomplete: {0}")]
    IncompleteFrame(String),

    #[error("SDK error during {operation}: {message}")]
    Sdk { operation: String, message: String },

    #[error("Device session is no longer valid: {0}")]
    SessionInvalid(String),

    #[error("Invalid session transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Camera session is not active ({0:?})")]
    NotActive(SessionState),

    #[error("Failed to convert frame: {0}")]
    Conversion(String),

    #[error("Acquisition thread did not stop within {0} ms")]
    StopTimeout(u64),

    #[error("Acquisition thread error: {0}")]
    Worker(String),

    #[error("Failed to configure camera: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn display(msg: impl Into<String>) -> Self {
        AppError::Display(msg.into())
    }
}

impl CameraError {
    pub fn sdk(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CameraError::Sdk {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn incomplete(description: impl Into<String>) -> Self {
        CameraError::IncompleteFrame(description.into())
    }

    pub fn session_invalid(msg: impl Into<String>) -> Self {
        CameraError::SessionInvalid(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        CameraError::Conversion(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        CameraError::Configuration(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        CameraError::Worker(msg.into())
    }

    /// Whether the acquisition loop has to give up after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CameraError::SessionInvalid(_) | CameraError::NoDevice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(CameraError::session_invalid("unplugged").is_fatal());
        assert!(CameraError::NoDevice.is_fatal());
        assert!(!CameraError::incomplete("missing packets").is_fatal());
        assert!(!CameraError::sdk("GetNextImage", "timeout").is_fatal());
    }

    #[test]
    fn test_camera_error_converts_into_app_error() {
        let err: AppError = CameraError::NoDevice.into();
        assert!(matches!(err, AppError::Camera(CameraError::NoDevice)));
        assert_eq!(err.to_string(), "Camera error: No camera detected");
    }
}
