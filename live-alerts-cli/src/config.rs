use std::fs;
use std::path::{Path, PathBuf};

use live_alerts::{AlertConfig, Category};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CliError, Result};

const APP_DIR: &str = "live-alerts";
const CONFIG_FILE: &str = "config.toml";

/// Everything stored in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub alerts: AlertConfig,
    pub overlay: OverlayLayout,
}

/// A scene and the names of the sources placed in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneLayout {
    pub name: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Scenes and text sources of the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayLayout {
    /// Scene on air at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_scene: Option<String>,
    /// Where to write the overlay state as JSON after every change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_file: Option<PathBuf>,
    pub text_sources: Vec<String>,
    pub scenes: Vec<SceneLayout>,
}

impl Default for OverlayLayout {
    /// One "Live" scene carrying a sub-scene per alert category, each holding
    /// that category's default text sources.
    fn default() -> Self {
        let alerts = AlertConfig::default();
        let mut text_sources = Vec::new();
        let mut scenes = Vec::new();
        let mut live = SceneLayout {
            name: "Live".to_string(),
            items: Vec::new(),
        };

        for category in Category::ALL {
            let config = alerts.category(category);
            let texts: Vec<String> = category
                .required_slots()
                .iter()
                .filter_map(|role| config.slots.name_for(*role))
                .map(str::to_string)
                .collect();
            text_sources.extend(texts.iter().cloned());
            scenes.push(SceneLayout {
                name: config.toggle.clone(),
                items: texts,
            });
            live.items.push(config.toggle.clone());
        }
        scenes.insert(0, live);

        Self {
            active_scene: Some("Live".to_string()),
            snapshot_file: None,
            text_sources,
            scenes,
        }
    }
}

impl AppConfig {
    /// Default config file location.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(CliError::NoConfigDir)
    }

    fn resolve(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Load the config, falling back to defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve(path)?;
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let mut config: Self = toml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.clone(),
            source,
        })?;
        config.alerts.fill_defaults();
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.show()?)?;
        info!(path = %path.display(), "Saved config");
        Ok(path)
    }

    /// Overwrite the config file with defaults.
    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        Self::default().save(path)
    }

    /// Write defaults unless a config file already exists.
    pub fn init(path: Option<&Path>) -> Result<(PathBuf, bool)> {
        let resolved = Self::resolve(path)?;
        if resolved.exists() {
            return Ok((resolved, false));
        }
        Ok((Self::default().save(Some(&resolved))?, true))
    }

    /// The config as TOML.
    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
