use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:9500/api/v1";
pub const APP_DIR: &str = "taskdash";
pub const CONFIG_FILE: &str = "config.json";
pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the {0} directory")]
    NoDirectory(&'static str),

    #[error("failed to access config file '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub session_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Reads the config file; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes a default config unless one already exists. Returns whether a
    /// file was written.
    pub fn init(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_string_pretty(&Self::default()).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, data).map_err(io_err)?;
        Ok(true)
    }

    pub fn session_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.session_file {
            return Ok(path.clone());
        }
        let dir = dirs::data_dir().ok_or(ConfigError::NoDirectory("data"))?;
        Ok(dir.join(APP_DIR).join(SESSION_FILE))
    }
}
