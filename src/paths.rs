use dirs::data_dir;
use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    base.join("eventscout")
});

pub fn data_root() -> PathBuf {
    DATA_ROOT.clone()
}

pub fn preferences_path() -> PathBuf {
    data_root().join("preferences.json")
}

pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).map_err(|err| {
            warn!("failed to create parent {:?}: {err}", parent);
            err
        }),
        _ => Ok(()),
    }
}
