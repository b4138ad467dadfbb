use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

/// File name of the persisted manager configuration.
pub const CONFIG_FILE_NAME: &str = "modmanagerconfig.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("encode config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted manager settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModManagerConfig {
    pub custom_steam_path: Option<PathBuf>,
    pub custom_stardew_path: Option<PathBuf>,
    pub recent_mod_packs: Vec<ModPackInfo>,
    /// Bearer token sent with GitHub requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModPackInfo {
    pub path: PathBuf,
    pub last_install_time: DateTime<Utc>,
}

impl ModManagerConfig {
    /// Records an installed mod pack as the most recent one.
    ///
    /// An existing entry for the same path is moved to the front.
    pub fn record_recent_mod_pack(&mut self, path: impl Into<PathBuf>, at: DateTime<Utc>) {
        let path = path.into();
        self.recent_mod_packs.retain(|pack| pack.path != path);
        self.recent_mod_packs.insert(
            0,
            ModPackInfo {
                path,
                last_install_time: at,
            },
        );
    }

    /// Forgets a recent mod pack. Returns whether an entry was removed.
    pub fn remove_recent_mod_pack(&mut self, path: &Path) -> bool {
        let before = self.recent_mod_packs.len();
        self.recent_mod_packs.retain(|pack| pack.path != path);
        before != self.recent_mod_packs.len()
    }
}

/// Owns the on-disk [`ModManagerConfig`] and the in-memory copy of it.
#[derive(Debug)]
pub struct ConfigService {
    path: PathBuf,
    config: RwLock<ModManagerConfig>,
}

impl ConfigService {
    /// Loads the config at `path`.
    ///
    /// Never fails: a missing file is created with defaults, an unreadable or
    /// malformed one is logged and replaced by defaults in memory only.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = load_or_default(&path);
        Self {
            path,
            config: RwLock::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A snapshot of the current config.
    pub fn get(&self) -> ModManagerConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `f` to a copy of the config, saves it, then makes it current.
    ///
    /// On a failed save the in-memory config is left untouched.
    pub fn update<R>(&self, f: impl FnOnce(&mut ModManagerConfig) -> R) -> Result<R, ConfigError> {
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        let ret = f(&mut next);
        save(&self.path, &next).inspect_err(|e| error!("failed to save config: {e}"))?;
        *guard = next;
        Ok(ret)
    }
}

#[instrument(level = "debug")]
fn load_or_default(path: &Path) -> ModManagerConfig {
    if !path.exists() {
        let config = ModManagerConfig::default();
        if let Err(e) = save(path, &config) {
            warn!("failed to write default config: {e}");
        }
        return config;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("failed to read config, using defaults: {e}");
            return ModManagerConfig::default();
        }
    };
    if content.trim().is_empty() {
        warn!("config file is empty, using defaults");
        return ModManagerConfig::default();
    }
    serde_json::from_str(&content)
        .inspect_err(|e| error!("failed to parse config, using defaults: {e}"))
        .unwrap_or_default()
}

fn save(path: &Path, config: &ModManagerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
