use thiserror::Error;

/// A failed detection round trip.
///
/// Every variant is transient: the capture loop reports it and carries on
/// with the next tick.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detection request failed: {0}")]
    Transport(String),

    #[error("detection request timed out")]
    Timeout,

    #[error("detection service returned HTTP {0}")]
    Status(u16),

    #[error("could not decode detection response: {0}")]
    Decode(String),

    /// The service answered with a success code but reported a failure in
    /// the body.
    #[error("detection service reported an error: {0}")]
    Service(String),
}

impl From<reqwest::Error> for DetectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DetectionError>;
