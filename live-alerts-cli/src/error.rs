use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Alert system error: {0}")]
    Alerts(#[from] live_alerts::Error),

    #[error("Invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not write config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Invalid overlay layout: {0}")]
    Layout(String),

    #[error("No config directory found on this platform; pass --config")]
    NoConfigDir,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
