use std::path::{Path, PathBuf};

use crate::settings::types::{Result, SessionSettings, SettingsError};

/// Env var naming the JSON settings file.
pub const CONFIG_ENV: &str = "FACEWATCH_CONFIG";
pub const ENDPOINT_ENV: &str = "FACEWATCH_ENDPOINT";
pub const EXPORT_DIR_ENV: &str = "FACEWATCH_EXPORT_DIR";
pub const TICK_MS_ENV: &str = "FACEWATCH_TICK_MS";

/// Load settings from a JSON file, returning defaults when it is missing.
pub fn load(path: &Path) -> Result<SessionSettings> {
    if !path.exists() {
        return Ok(SessionSettings::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let settings: SessionSettings = serde_json::from_str(&contents)?;
    settings.validate()?;
    Ok(settings)
}

/// Save settings atomically (write .tmp then rename).
pub fn save(path: &Path, settings: &SessionSettings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Apply env overrides on top of file settings. `lookup` is `std::env::var`
/// in production.
pub fn apply_overrides(
    settings: &mut SessionSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(endpoint) = lookup(ENDPOINT_ENV) {
        settings.endpoint = endpoint;
    }
    if let Some(dir) = lookup(EXPORT_DIR_ENV) {
        settings.export_dir = PathBuf::from(dir);
    }
    if let Some(tick) = lookup(TICK_MS_ENV) {
        settings.tick_ms = match tick.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => ms,
            _ => {
                return Err(SettingsError::InvalidValue {
                    key: TICK_MS_ENV.to_string(),
                    value: tick,
                })
            }
        };
    }
    settings.validate()
}

/// Settings from `FACEWATCH_CONFIG` (if set) plus env overrides.
///
/// Returns the config path too, so the caller can seed a missing file.
pub fn from_env() -> Result<(SessionSettings, Option<PathBuf>)> {
    let path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let mut settings = match &path {
        Some(path) => load(path)?,
        None => SessionSettings::default(),
    };
    apply_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok((settings, path))
}
