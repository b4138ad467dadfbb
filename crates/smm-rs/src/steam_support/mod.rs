use crate::config::ConfigError;
use std::{fmt, path::PathBuf};

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
mod windows;
#[cfg(target_os = "windows")]
use windows as imp;

#[cfg(not(target_os = "windows"))]
#[cfg_attr(docsrs, doc(cfg(not(target_os = "windows"))))]
mod unix;
#[cfg(not(target_os = "windows"))]
use unix as imp;

mod common;
mod local_config;
mod process;
mod session;

pub use common::{
    find_game_path_for_app, find_local_configs, installed_games, probe_steam_path,
    resolve_steam_path, user_from_local_config,
};
pub use imp::STEAM_PROCESS_NAME;
pub use local_config::{LocalConfig, launch_options_in, set_launch_options_in};
pub use process::{close_processes_named, close_steam, launch_game_via_steam};
pub use session::SteamSession;

/// Steam support errors
#[derive(Debug, thiserror::Error)]
pub enum SteamSupportError {
    /// Io error
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Error reading vdf
    #[error("parse vdf: {0}")]
    Vdf(#[from] vdf_reader::error::VdfError),
    /// Given app ID not found in the Steam library
    #[error("steam app ({0}) not found")]
    AppNotFound(u32),
    #[error("steam userdata directory not found: {}", .0.display())]
    UserDataNotFound(PathBuf),
    #[error("no localconfig.vdf found under {}", .0.display())]
    LocalConfigNotFound(PathBuf),
    #[error("no steam user selected")]
    NoUserSelected,
    #[error("walk directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("process {0} is still running")]
    ProcessNotTerminated(u32),
}

/// A Steam account that has signed in on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SteamUser {
    /// Steam3 account id, as used for the `userdata` folder name.
    pub id: String,
    pub nickname: String,
}

impl fmt::Display for SteamUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.nickname, self.id)
    }
}
