use thiserror::Error;

use crate::camera::types::Facing;

/// Camera acquisition errors.
///
/// Every variant is fatal to the current `start` attempt; the session stays
/// (or returns to) `Stopped`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no {0} camera available")]
    NoDevice(Facing),

    #[error("camera busy: {0}")]
    DeviceBusy(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_human_readable() {
        assert_eq!(
            CameraError::NoDevice(Facing::Front).to_string(),
            "no front camera available"
        );
        assert_eq!(
            CameraError::DeviceBusy("held by another app".to_string()).to_string(),
            "camera busy: held by another app"
        );
        assert_eq!(
            CameraError::PermissionDenied.to_string(),
            "camera permission denied"
        );
    }
}
