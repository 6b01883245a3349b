use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::camera::types::Resolution;

/// A single captured frame from the camera. Pixel data is packed RGB24.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

/// A frame that cannot be sent for detection. Never shown to the operator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("degenerate frame {width}x{height}")]
    Degenerate { width: u32, height: u32 },

    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

impl Frame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Check the frame is usable: non-zero dimensions and a buffer that
    /// matches them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.width == 0 || self.height == 0 {
            return Err(ValidationError::Degenerate {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(ValidationError::BufferSize {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, len: usize) -> Frame {
        Frame {
            data: vec![0; len],
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn well_formed_frame_validates() {
        assert!(frame(4, 2, 24).validate().is_ok());
    }

    #[test]
    fn zero_dimension_is_degenerate() {
        assert_eq!(
            frame(0, 480, 0).validate(),
            Err(ValidationError::Degenerate {
                width: 0,
                height: 480
            })
        );
        assert!(frame(640, 0, 0).validate().is_err());
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert_eq!(
            frame(4, 2, 10).validate(),
            Err(ValidationError::BufferSize {
                expected: 24,
                actual: 10
            })
        );
    }
}
