//! Canvas settings stored next to the boards in `settings.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::interaction::InteractionConfig;
use crate::layout::LayoutOptions;
use crate::placement::PlacementConfig;
use crate::storage::planboard_dir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    pub placement: PlacementConfig,
    pub layout: LayoutOptions,
    pub interaction: InteractionConfig,
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join("settings.json")
}

/// Missing or unreadable settings fall back to defaults.
pub fn read_settings() -> CanvasConfig {
    read_settings_in(&planboard_dir())
}

pub fn read_settings_in(dir: &Path) -> CanvasConfig {
    let path = settings_path(dir);
    if !path.exists() {
        return CanvasConfig::default();
    }
    match fs::read_to_string(&path).map(|s| serde_json::from_str(&s)) {
        Ok(Ok(config)) => config,
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid settings, using defaults");
            CanvasConfig::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
            CanvasConfig::default()
        }
    }
}

pub fn write_settings(config: &CanvasConfig) -> Result<()> {
    write_settings_in(&planboard_dir(), config)
}

pub fn write_settings_in(dir: &Path, config: &CanvasConfig) -> Result<()> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(settings_path(dir), json)?;
    Ok(())
}
