use std::path::PathBuf;

use crate::camera::types::{CameraDevice, CameraState, CameraStatus, Facing, Resolution};
use crate::detection::client::DetectionService;
use crate::diagnostics::stats::DiagnosticSnapshot;
use crate::geometry::view::{Preset, ViewGeometry};
use crate::notify::Notice;
use crate::overlay::renderer::OverlayScene;
use crate::roster::aggregator::Roster;
use crate::session::state::Session;

/// Parse a facing name, returning a human-readable error on failure.
fn parse_facing(s: &str) -> Result<Facing, String> {
    match s {
        "front" | "user" => Ok(Facing::Front),
        "back" | "environment" => Ok(Facing::Back),
        _ => Err(format!("Unknown camera facing: '{s}'")),
    }
}

fn parse_preset(s: &str) -> Result<Preset, String> {
    match s {
        "small" => Ok(Preset::Small),
        "medium" => Ok(Preset::Medium),
        "large" => Ok(Preset::Large),
        "full" => Ok(Preset::Full),
        _ => Err(format!("Unknown size preset: '{s}'")),
    }
}

/// List all connected cameras.
pub async fn list_cameras<D: DetectionService>(
    session: &Session<D>,
) -> Result<Vec<CameraDevice>, String> {
    session.devices().await.map_err(|e| e.to_string())
}

pub async fn get_camera_status<D: DetectionService>(
    session: &Session<D>,
) -> Result<CameraStatus, String> {
    Ok(session.status().await)
}

/// Start the camera. Defaults to the configured facing.
pub async fn start_camera<D: DetectionService>(
    session: &Session<D>,
    facing: Option<String>,
) -> Result<Resolution, String> {
    let facing = match facing {
        Some(s) => parse_facing(&s)?,
        None => session.settings().initial_facing,
    };
    session.start(facing).await.map_err(|e| e.to_string())
}

pub async fn stop_camera<D: DetectionService>(session: &Session<D>) -> Result<(), String> {
    session.stop().await;
    Ok(())
}

pub async fn pause_camera<D: DetectionService>(
    session: &Session<D>,
) -> Result<CameraState, String> {
    Ok(session.pause().await)
}

pub async fn resume_camera<D: DetectionService>(
    session: &Session<D>,
) -> Result<CameraState, String> {
    Ok(session.resume().await)
}

/// Flip between front and back cameras. `None` when the camera is stopped.
pub async fn switch_camera<D: DetectionService>(
    session: &Session<D>,
) -> Result<Option<Resolution>, String> {
    session.switch_facing().await.map_err(|e| e.to_string())
}

pub async fn set_mirrored<D: DetectionService>(
    session: &Session<D>,
    mirrored: bool,
) -> Result<(), String> {
    session.set_mirrored(mirrored).await;
    Ok(())
}

pub async fn set_detection_enabled<D: DetectionService>(
    session: &Session<D>,
    enabled: bool,
) -> Result<(), String> {
    session.set_detection_enabled(enabled).await;
    Ok(())
}

pub async fn get_roster<D: DetectionService>(session: &Session<D>) -> Result<Roster, String> {
    Ok(session.roster_snapshot())
}

pub async fn clear_roster<D: DetectionService>(session: &Session<D>) -> Result<(), String> {
    session.clear_roster();
    Ok(())
}

pub async fn get_overlay<D: DetectionService>(
    session: &Session<D>,
) -> Result<Option<OverlayScene>, String> {
    Ok(session.overlay())
}

pub async fn get_diagnostics<D: DetectionService>(
    session: &Session<D>,
) -> Result<DiagnosticSnapshot, String> {
    Ok(session.diagnostics())
}

pub async fn get_notices<D: DetectionService>(
    session: &Session<D>,
) -> Result<Vec<Notice>, String> {
    Ok(session.notices())
}

pub async fn get_geometry<D: DetectionService>(
    session: &Session<D>,
) -> Result<ViewGeometry, String> {
    Ok(session.geometry())
}

pub async fn apply_preset<D: DetectionService>(
    session: &Session<D>,
    preset: String,
) -> Result<ViewGeometry, String> {
    let preset = parse_preset(&preset)?;
    Ok(session.apply_preset(preset))
}

pub async fn set_container_width<D: DetectionService>(
    session: &Session<D>,
    width: f64,
) -> Result<ViewGeometry, String> {
    if !width.is_finite() || width < 0.0 {
        return Err(format!("Invalid container width: {width}"));
    }
    Ok(session.set_container_width(width))
}

/// Write the roster to the export directory (or `dir` when given) and
/// return the file path.
pub async fn export_roster<D: DetectionService>(
    session: &Session<D>,
    dir: Option<String>,
) -> Result<String, String> {
    let dir = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| session.settings().export_dir.clone());
    let path = session
        .export_to_dir(&dir)
        .await
        .map_err(|e| e.to_string())?;
    Ok(path.display().to_string())
}

/// Save the current frame with its overlay. `None` when the camera is
/// not running.
pub async fn export_frame<D: DetectionService>(
    session: &Session<D>,
    dir: Option<String>,
) -> Result<Option<String>, String> {
    let dir = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| session.settings().export_dir.clone());
    let path = session
        .export_annotated_frame(&dir)
        .await
        .map_err(|e| e.to_string())?;
    Ok(path.map(|p| p.display().to_string()))
}
