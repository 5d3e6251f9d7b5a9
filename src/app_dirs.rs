use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn settings_path() -> PathBuf {
        ProjectDirs::from("", "", "aimrange")
            .map(|pd| pd.config_dir().join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("aimrange_settings.json"))
    }

    pub fn media_db_path() -> PathBuf {
        ProjectDirs::from("", "", "aimrange")
            .map(|pd| pd.data_local_dir().join("media.db"))
            .unwrap_or_else(|| PathBuf::from("aimrange_media.db"))
    }

    /// Both files under one directory, for `--data-dir` overrides and tests.
    pub fn under<P: AsRef<Path>>(dir: P) -> (PathBuf, PathBuf) {
        let dir = dir.as_ref();
        (dir.join("settings.json"), dir.join("media.db"))
    }
}
