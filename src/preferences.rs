use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::paths;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("preferences io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preferences encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Everything persisted between launches. `theme` is the only key.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

pub struct PreferenceStore {
    path: PathBuf,
    data: Mutex<Preferences>,
}

impl PreferenceStore {
    pub fn open_default() -> Self {
        Self::load(paths::preferences_path())
    }

    /// Reads `path` if it exists. Unreadable files fall back to defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = read_preferences(&path).unwrap_or_else(|err| {
            warn!("ignoring unreadable preferences at {:?}: {err}", path);
            Preferences::default()
        });
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Preferences {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<F>(&self, transform: F) -> Result<Preferences, PreferencesError>
    where
        F: FnOnce(&mut Preferences),
    {
        let mut guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        transform(&mut next);
        write_preferences(&self.path, &next)?;
        *guard = next;
        Ok(guard.clone())
    }

    /// Stored theme, or the system hint when nothing was stored.
    pub fn effective_theme(&self, system_prefers_dark: bool) -> Theme {
        self.read().theme.unwrap_or(if system_prefers_dark {
            Theme::Dark
        } else {
            Theme::Light
        })
    }

    pub fn toggle_theme(&self, system_prefers_dark: bool) -> Result<Theme, PreferencesError> {
        let next = self.effective_theme(system_prefers_dark).toggled();
        self.update(|prefs| prefs.theme = Some(next))?;
        debug!(theme = ?next, "theme preference stored");
        Ok(next)
    }
}

fn read_preferences(path: &Path) -> Result<Preferences, PreferencesError> {
    if !path.exists() {
        return Ok(Preferences::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_preferences(path: &Path, prefs: &Preferences) -> Result<(), PreferencesError> {
    paths::ensure_parent(path)?;
    let contents = serde_json::to_string_pretty(prefs)?;
    fs::write(path, contents)?;
    Ok(())
}
