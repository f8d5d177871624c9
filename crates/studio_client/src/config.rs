use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

pub const SETTINGS_FILE: &str = "studio.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// How long the first `core.getDeviceInfo` call may take before the
    /// device is considered unresponsive.
    pub device_info_timeout: Duration,
    /// Pause between discarding changes and re-reading the keymap, while the
    /// device reloads from flash.
    pub discard_reload_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            device_info_timeout: Duration::from_millis(1000),
            discard_reload_delay: Duration::from_millis(600),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    device_info_timeout_ms: Option<u64>,
    discard_reload_delay_ms: Option<u64>,
}

/// Defaults, overlaid by `studio.toml` in the working directory, overlaid by
/// `STUDIO__*` environment variables.
pub fn load_settings() -> SyncSettings {
    let mut settings = SyncSettings::default();
    let path = Path::new(SETTINGS_FILE);
    if path.exists() {
        match read_settings_file(path) {
            Ok(file_cfg) => apply_file_settings(&mut settings, &file_cfg),
            Err(err) => warn!("config: ignoring {SETTINGS_FILE}: {err:#}"),
        }
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn read_settings_file(path: &Path) -> anyhow::Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_settings(&raw)
}

fn parse_settings(raw: &str) -> anyhow::Result<FileSettings> {
    toml::from_str(raw).context("invalid settings toml")
}

fn apply_file_settings(settings: &mut SyncSettings, file_cfg: &FileSettings) {
    if let Some(ms) = file_cfg.device_info_timeout_ms {
        settings.device_info_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = file_cfg.discard_reload_delay_ms {
        settings.discard_reload_delay = Duration::from_millis(ms);
    }
}

fn apply_env_overrides(settings: &mut SyncSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(ms) = parse_millis(&lookup, "STUDIO__DEVICE_INFO_TIMEOUT_MS") {
        settings.device_info_timeout = ms;
    }
    if let Some(ms) = parse_millis(&lookup, "STUDIO__DISCARD_RELOAD_DELAY_MS") {
        settings.discard_reload_delay = ms;
    }
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            warn!(key, value = %raw, "config: ignoring non-numeric override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
