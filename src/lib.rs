pub mod camera;
pub mod capture;
pub mod detection;
pub mod diagnostics;
pub mod export;
pub mod geometry;
pub mod notify;
pub mod overlay;
pub mod roster;
pub mod session;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use camera::backend::{CameraBackend, NullBackend};
use camera::dummy::DummyBackend;
use camera::error::CameraError;
use detection::client::HttpDetectionClient;
use detection::error::DetectionError;
use export::snapshot::ExportError;
use session::state::Session;
use settings::types::{SessionSettings, SettingsError};

/// How long the binary runs before exporting; unset means until Ctrl-C.
const RUN_SECS_ENV: &str = "FACEWATCH_RUN_SECS";

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("invalid FACEWATCH_RUN_SECS: {0:?}")]
    RunSecs(String),
}

/// Create the camera backend for the current platform.
///
/// When `DUMMY_CAMERA=1` is set, a simulated camera is used instead.
pub fn create_backend() -> Arc<dyn CameraBackend> {
    if DummyBackend::is_enabled() {
        tracing::info!("using simulated camera");
        return Arc::new(DummyBackend::new());
    }
    tracing::warn!("no camera backend available on this platform; set DUMMY_CAMERA=1 to simulate one");
    Arc::new(NullBackend)
}

fn run_duration() -> Result<Option<Duration>, RunError> {
    match std::env::var(RUN_SECS_ENV) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| RunError::RunSecs(value)),
        Err(_) => Ok(None),
    }
}

pub fn run() -> Result<(), RunError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let (settings, config_path) = settings::store::from_env()?;
    if let Some(path) = config_path.filter(|p| !p.exists()) {
        settings::store::save(&path, &settings)?;
        tracing::info!("wrote default settings to {}", path.display());
    }
    let duration = run_duration()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_session(settings, duration))
}

async fn run_session(settings: SessionSettings, duration: Option<Duration>) -> Result<(), RunError> {
    let client = HttpDetectionClient::new(settings.client_config())?;
    if !client.health_check().await {
        tracing::warn!(
            "detection service at {} is not responding; frames will fail until it is up",
            settings.endpoint
        );
    }

    let session = Session::new(settings.clone(), create_backend(), client);
    match session.devices().await {
        Ok(devices) => {
            for device in &devices {
                tracing::info!("found {} ({})", device.name, device.id);
            }
        }
        Err(e) => tracing::warn!("camera enumeration failed: {e}"),
    }

    session.start(settings.initial_facing).await?;

    let mut report = tokio::time::interval(Duration::from_secs(5));
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            _ = report.tick() => {
                let stats = session.diagnostics();
                tracing::info!(
                    "fps {:?}, {} round trips, {} skipped, {} failed, {} identities",
                    stats.fps,
                    stats.round_trips,
                    stats.skipped_ticks,
                    stats.failures,
                    session.roster_snapshot().len()
                );
            }
        }
    }

    let path = session.export_to_dir(&settings.export_dir).await?;
    tracing::info!("roster written to {}", path.display());
    match session.export_annotated_frame(&settings.export_dir).await {
        Ok(Some(path)) => tracing::info!("last frame written to {}", path.display()),
        Ok(None) => tracing::debug!("camera not running, no frame to export"),
        Err(e) => tracing::warn!("could not export last frame: {e}"),
    }
    session.stop().await;
    Ok(())
}
