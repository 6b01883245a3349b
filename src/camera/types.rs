use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable camera identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new `DeviceId` from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the inner string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which physical camera is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Front,
    Back,
}

impl Facing {
    /// The camera on the other side of the device.
    pub fn opposite(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front => write!(f, "front"),
            Self::Back => write!(f, "back"),
        }
    }
}

/// Lifecycle state of the camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl CameraState {
    /// Whether a hardware stream must be held in this state.
    pub fn holds_resource(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Native capture resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, or `None` for a degenerate resolution.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(f64::from(self.width) / f64::from(self.height))
    }
}

/// Discovered camera device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDevice {
    pub id: DeviceId,
    pub name: String,
    pub facing: Facing,
    pub native_resolution: Resolution,
}

/// Observable view of the camera session, for IPC.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub state: CameraState,
    pub facing: Facing,
    pub mirrored: bool,
    pub has_stream: bool,
    pub native_resolution: Option<Resolution>,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_opposite_round_trips() {
        assert_eq!(Facing::Front.opposite(), Facing::Back);
        assert_eq!(Facing::Back.opposite().opposite(), Facing::Back);
    }

    #[test]
    fn only_running_and_paused_hold_resource() {
        assert!(!CameraState::Stopped.holds_resource());
        assert!(CameraState::Running.holds_resource());
        assert!(CameraState::Paused.holds_resource());
    }

    #[test]
    fn aspect_ratio_from_resolution() {
        let ratio = Resolution::new(1280, 720).aspect_ratio().unwrap();
        assert!((ratio - 16.0 / 9.0).abs() < 1e-9);
        assert!(Resolution::new(0, 720).aspect_ratio().is_none());
        assert!(Resolution::new(1280, 0).aspect_ratio().is_none());
    }

    #[test]
    fn facing_serialises_lowercase() {
        assert_eq!(serde_json::to_value(Facing::Back).unwrap(), "back");
        let parsed: Facing = serde_json::from_str("\"front\"").unwrap();
        assert_eq!(parsed, Facing::Front);
    }

    #[test]
    fn camera_device_serialises_to_camelcase() {
        let device = CameraDevice {
            id: DeviceId::new("dummy:front"),
            name: "Front".to_string(),
            facing: Facing::Front,
            native_resolution: Resolution::new(640, 480),
        };
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["id"], "dummy:front");
        assert_eq!(json["nativeResolution"]["width"], 640);
    }
}
