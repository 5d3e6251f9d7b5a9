use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::settings::GameSettings;
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait SettingsStore {
    /// Stored settings, or `None` on first run or when the stored JSON is unreadable.
    fn load(&self) -> Option<GameSettings>;
    fn save(&self, settings: &GameSettings) -> Result<()>;
}

/// Settings persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::settings_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Option<GameSettings> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("cannot read settings at {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice::<GameSettings>(&bytes) {
            Ok(mut settings) => {
                settings.sanitize();
                Some(settings)
            }
            Err(e) => {
                log::warn!("ignoring unreadable settings at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save(&self, settings: &GameSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// Keeps the serialised form in memory, so reloads behave like the file store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    json: RefCell<Option<String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(json: &str) -> Self {
        Self {
            json: RefCell::new(Some(json.to_string())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.json.borrow().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Option<GameSettings> {
        let json = self.json.borrow();
        match serde_json::from_str::<GameSettings>(json.as_deref()?) {
            Ok(mut settings) => {
                settings.sanitize();
                Some(settings)
            }
            Err(e) => {
                log::warn!("ignoring unreadable stored settings: {}", e);
                None
            }
        }
    }

    fn save(&self, settings: &GameSettings) -> Result<()> {
        *self.json.borrow_mut() = Some(serde_json::to_string(settings)?);
        Ok(())
    }
}

/// Stored settings, or defaults when nothing usable is stored.
pub fn load_or_default(store: &dyn SettingsStore) -> GameSettings {
    store.load().unwrap_or_default()
}
