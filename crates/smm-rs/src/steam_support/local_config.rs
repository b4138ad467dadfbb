use crate::{
    steam_support::{SteamSupportError, SteamUser, common::find_local_configs},
    vdf::{self, VdfDocument, VdfValue},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

const LAUNCH_OPTIONS_KEY: &str = "LaunchOptions";

/// A user's `localconfig.vdf`.
///
/// Every operation reads the file afresh; writes are a plain read, modify,
/// write cycle with no locking against the Steam client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    path: PathBuf,
}

impl LocalConfig {
    /// Finds the config of `user` below `<steam>/userdata/<id>`.
    ///
    /// With several candidates, the first one by path order is used.
    pub fn locate(steam_path: &Path, user: &SteamUser) -> Result<Self, SteamSupportError> {
        let user_dir = steam_path.join("userdata").join(&user.id);
        let path = find_local_configs(&user_dir)?
            .into_iter()
            .next()
            .ok_or(SteamSupportError::LocalConfigNotFound(user_dir))?;
        debug!("selected local config for user {}: {}", user.id, path.display());
        Ok(Self { path })
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<VdfDocument, SteamSupportError> {
        let content = fs::read_to_string(&self.path)
            .inspect_err(|e| error!("failed to read {}: {e}", self.path.display()))?;
        Ok(vdf::parse(&content))
    }

    /// The unescaped launch options of `app_id`, if the app has any entry.
    pub fn launch_options(&self, app_id: u32) -> Result<Option<String>, SteamSupportError> {
        let options = launch_options_in(&self.load()?, app_id);
        debug!("launch options for app {app_id}: {options:?}");
        Ok(options)
    }

    /// Stores `value` as the launch options of `app_id`.
    ///
    /// Returns `false` without touching the file when the app block or its
    /// `LaunchOptions` key does not exist.
    pub fn set_launch_options(&self, app_id: u32, value: &str) -> Result<bool, SteamSupportError> {
        info!("setting launch options for app {app_id}: {value:?}");
        let mut doc = self.load()?;
        if !set_launch_options_in(&mut doc, app_id, value) {
            warn!("no changes made to launch options for app {app_id}");
            return Ok(false);
        }

        fs::write(&self.path, vdf::serialize(&doc))
            .inspect_err(|e| error!("failed to write {}: {e}", self.path.display()))?;
        info!("updated launch options for app {app_id}");
        Ok(true)
    }
}

/// Reads the launch options of `app_id` from a parsed config.
pub fn launch_options_in(doc: &VdfDocument, app_id: u32) -> Option<String> {
    let Some(app) = doc.find_entry(&app_id.to_string()).and_then(VdfValue::as_object) else {
        debug!("game entry not found for app {app_id}");
        return None;
    };
    let raw = app.find_entry(LAUNCH_OPTIONS_KEY).and_then(VdfValue::as_str)?;
    Some(vdf::unescape(vdf::unquote(raw)))
}

/// Replaces the launch options of `app_id` in a parsed config.
pub fn set_launch_options_in(doc: &mut VdfDocument, app_id: u32, value: &str) -> bool {
    let Some(app) = doc
        .find_entry_mut(&app_id.to_string())
        .and_then(VdfValue::as_object_mut)
    else {
        warn!("game entry not found for app {app_id}");
        return false;
    };
    if !app.replace_first(LAUNCH_OPTIONS_KEY, vdf::quote(&vdf::escape(value))) {
        warn!("LaunchOptions key not found for app {app_id}");
        return false;
    }
    true
}
