//! Application configuration loaded from an external JSON file.
//!
//! Nothing here is required to exist on disk: a missing file yields the
//! defaults, and every field has its own default so partial files work.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Directories searched for cover images, tried in order after the
    /// declared path itself.
    #[serde(default = "default_cover_dirs")]
    pub cover_dirs: Vec<PathBuf>,
    /// Bounds the scaled cover must fit within.
    #[serde(default = "default_cover_max_width")]
    pub cover_max_width: u32,
    #[serde(default = "default_cover_max_height")]
    pub cover_max_height: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mylibrary.db")
}

fn default_cover_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("covers"), PathBuf::from("images")]
}

fn default_cover_max_width() -> u32 {
    280
}

fn default_cover_max_height() -> u32 {
    380
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(),
            cover_dirs: default_cover_dirs(),
            cover_max_width: default_cover_max_width(),
            cover_max_height: default_cover_max_height(),
        }
    }
}

impl Config {
    /// Read configuration from `path`. A file that does not exist is not an
    /// error; the defaults are used and a note is logged.
    pub fn load(path: &Path) -> Result<Config, String> {
        if !path.exists() {
            log::info!("config file {} not found, using defaults", path.display());
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
        serde_json::from_str(&raw).map_err(|err| err.to_string())
    }
}
