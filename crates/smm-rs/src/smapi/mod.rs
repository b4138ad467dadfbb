//! SMAPI installation state for one game folder.

use crate::{
    STARDEW_VALLEY_STEAM_APP_ID,
    archive::ArchiveError,
    config::{ConfigError, ConfigService, ModPackInfo},
    github::{GitHubClient, GitHubError},
    mods::{self, Mod, ModsError},
    steam_support::{SteamSession, SteamSupportError, SteamUser, find_game_path_for_app},
    utils::CancelSignal,
};
use chrono::Utc;
use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{sync::watch, task};

mod install;

pub use install::{INSTALLER_RELATIVE_PATH, InstallOutcome, InstallState, locate_installer, select_installer_asset};

/// File name of the SMAPI loader inside the game folder.
#[cfg(target_os = "windows")]
pub const LOADER_EXECUTABLE: &str = "StardewModdingAPI.exe";
#[cfg(not(target_os = "windows"))]
pub const LOADER_EXECUTABLE: &str = "StardewModdingAPI";

const DEFAULT_GAME_FOLDER: &str = "Stardew Valley";

#[derive(Debug, thiserror::Error)]
pub enum SmapiError {
    #[error("release lookup: {0}")]
    ReleaseLookup(#[source] GitHubError),
    #[error("download: {0}")]
    Download(#[source] GitHubError),
    #[error("extract: {0}")]
    Archive(#[source] ArchiveError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("installer not found: {}", .0.display())]
    InstallerNotFound(PathBuf),
    #[error("failed to start installer: {0}")]
    InstallerStart(#[source] io::Error),
    #[error("installer exited with code {0:?}")]
    InstallerFailed(Option<i32>),
    #[error("SMAPI loader missing after install: {}", .0.display())]
    VerificationFailed(PathBuf),
    #[error("installation cancelled")]
    Cancelled,
    #[error("background task failed: {0}")]
    Join(#[from] task::JoinError),
    #[error(transparent)]
    Steam(#[from] SteamSupportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mods(#[from] ModsError),
}

/// Tracks whether SMAPI is installed into the game folder and whether Steam
/// launches the game through it.
///
/// Only one install or toggle should run at a time; nothing guards the
/// user's `localconfig.vdf` against concurrent writers.
#[derive(Debug)]
pub struct SmapiManager {
    session: Arc<SteamSession>,
    config: Arc<ConfigService>,
    github: GitHubClient,
    work_dir: PathBuf,
    game_path: RwLock<PathBuf>,
    is_installed: AtomicBool,
    is_enabled: AtomicBool,
    user_rx: Mutex<watch::Receiver<Option<SteamUser>>>,
}

impl SmapiManager {
    pub fn new(session: Arc<SteamSession>, config: Arc<ConfigService>, github: GitHubClient) -> Self {
        let user_rx = session.subscribe();
        let game_path = resolve_game_path(&session, &config);
        let manager = Self {
            session,
            config,
            github,
            work_dir: std::env::temp_dir(),
            game_path: RwLock::new(game_path),
            is_installed: AtomicBool::new(false),
            is_enabled: AtomicBool::new(false),
            user_rx: Mutex::new(user_rx),
        };
        manager.refresh();
        manager
    }

    /// Directory for the downloaded package and its extraction.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn session(&self) -> &Arc<SteamSession> {
        &self.session
    }

    pub fn game_path(&self) -> PathBuf {
        self.game_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn loader_path(&self) -> PathBuf {
        self.game_path().join(LOADER_EXECUTABLE)
    }

    /// The launch options that make Steam start the game through SMAPI.
    pub fn launch_command(&self) -> String {
        format!("\"{}\" %command%", self.loader_path().display())
    }

    pub fn is_installed(&self) -> bool {
        self.is_installed.load(Ordering::Acquire)
    }

    /// Whether the current user's launch options are exactly
    /// [`SmapiManager::launch_command`].
    ///
    /// Re-read from disk when the current user changed since the last call.
    pub fn is_enabled(&self) -> bool {
        let mut rx = self.user_rx.lock().unwrap_or_else(PoisonError::into_inner);
        if rx.has_changed().unwrap_or(false) {
            rx.borrow_and_update();
            drop(rx);
            self.refresh_enabled();
        }
        self.is_enabled.load(Ordering::Acquire)
    }

    /// Re-resolves the game folder and re-checks both flags.
    pub fn refresh(&self) {
        *self.game_path.write().unwrap_or_else(PoisonError::into_inner) =
            resolve_game_path(&self.session, &self.config);
        self.refresh_installed();
        self.refresh_enabled();
    }

    fn refresh_installed(&self) {
        let installed = self.loader_path().is_file();
        debug!("SMAPI installed: {installed}");
        self.is_installed.store(installed, Ordering::Release);
    }

    fn refresh_enabled(&self) {
        let enabled = match self.session.launch_options(STARDEW_VALLEY_STEAM_APP_ID) {
            Ok(options) => options.is_some_and(|options| options == self.launch_command()),
            Err(e) => {
                debug!("cannot read launch options: {e}");
                false
            }
        };
        debug!("SMAPI enabled: {enabled}");
        self.is_enabled.store(enabled, Ordering::Release);
    }

    /// Persists a custom game folder (or clears it) and re-checks the state.
    pub fn set_custom_stardew_path(&self, path: Option<PathBuf>) -> Result<(), SmapiError> {
        info!("setting custom stardew path: {path:?}");
        self.config.update(|config| config.custom_stardew_path = path)?;
        self.refresh();
        info!("game path updated to: {}", self.game_path().display());
        Ok(())
    }

    /// Switches Steam between launching the game directly and through SMAPI.
    ///
    /// Steam is closed first since it rewrites `localconfig.vdf` on exit.
    /// The cached flag only flips when the launch options were written; a
    /// config without the app's `LaunchOptions` key leaves it as it was.
    /// Returns the new state.
    #[instrument(skip(self))]
    pub async fn toggle_is_enabled(&self) -> Result<bool, SmapiError> {
        self.session.close_steam().await;

        let enabled = self.is_enabled();
        let value = if enabled { String::new() } else { self.launch_command() };
        if self
            .session
            .set_launch_options(STARDEW_VALLEY_STEAM_APP_ID, &value)?
        {
            self.is_enabled.store(!enabled, Ordering::Release);
        } else {
            warn!("launch options unchanged, SMAPI stays {}", if enabled { "enabled" } else { "disabled" });
        }
        Ok(self.is_enabled.load(Ordering::Acquire))
    }

    pub fn launch_game(&self) -> Result<(), SmapiError> {
        Ok(self.session.launch_game(STARDEW_VALLEY_STEAM_APP_ID)?)
    }

    pub fn mods(&self) -> Result<Vec<Mod>, SmapiError> {
        Ok(mods::list_mods(&self.game_path())?)
    }

    pub fn set_mod_enabled(&self, name: &str, enabled: bool) -> Result<(), SmapiError> {
        Ok(mods::set_mod_enabled(&self.game_path(), name, enabled)?)
    }

    pub async fn export_mod_pack(&self, dest: &Path) -> Result<usize, SmapiError> {
        let game_path = self.game_path();
        let dest = dest.to_path_buf();
        Ok(task::spawn_blocking(move || mods::export_mod_pack(&game_path, &dest)).await??)
    }

    /// Replaces the installed mods with `pack` and remembers it as recent.
    pub async fn install_mod_pack(&self, pack: &Path, cancel: &CancelSignal) -> Result<usize, SmapiError> {
        let game_path = self.game_path();
        let archive = pack.to_path_buf();
        let cancel = cancel.clone();
        let count = task::spawn_blocking(move || mods::install_mod_pack(&game_path, &archive, &cancel))
            .await?
            .map_err(|e| match e {
                ModsError::Archive(ArchiveError::Cancelled) => SmapiError::Cancelled,
                e => SmapiError::Mods(e),
            })?;

        self.config
            .update(|config| config.record_recent_mod_pack(pack, Utc::now()))?;
        Ok(count)
    }

    pub fn recent_mod_packs(&self) -> Vec<ModPackInfo> {
        self.config.get().recent_mod_packs
    }

    /// Forgets a recent mod pack; the archive itself is left alone.
    pub fn delete_recent_mod_pack(&self, pack: &Path) -> Result<bool, SmapiError> {
        Ok(self
            .config
            .update(|config| config.remove_recent_mod_pack(pack))?)
    }
}

fn resolve_game_path(session: &SteamSession, config: &ConfigService) -> PathBuf {
    if let Some(custom) = config.get().custom_stardew_path {
        return custom;
    }
    let steam_path = session.steam_path();
    match find_game_path_for_app(&steam_path, STARDEW_VALLEY_STEAM_APP_ID) {
        Ok(path) => path,
        Err(e) => {
            debug!("stardew valley not found in steam libraries: {e}");
            steam_path
                .join("steamapps")
                .join("common")
                .join(DEFAULT_GAME_FOLDER)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LOCALCONFIG: &str = "\"UserLocalConfigStore\"\n{\n\t\"friends\"\n\t{\n\t\t\"7\"\n\t\t{\n\t\t}\n\t\t\"PersonaName\"\t\t\"Abigail\"\n\t}\n\t\"Software\"\n\t{\n\t\t\"413150\"\n\t\t{\n\t\t\t\"LaunchOptions\"\t\t\"\"\n\t\t}\n\t}\n}\n";

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        manager: SmapiManager,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let user_dir = root.join("Steam/userdata/7/config");
        fs::create_dir_all(&user_dir).unwrap();
        fs::write(user_dir.join("localconfig.vdf"), LOCALCONFIG).unwrap();

        let config = Arc::new(ConfigService::load(root.join("config.json")));
        config
            .update(|c| c.custom_steam_path = Some(root.join("Steam")))
            .unwrap();
        let session = Arc::new(
            SteamSession::new(config.clone()).with_steam_process_name("smm-test-no-such-steam"),
        );
        let github = GitHubClient::new(None).unwrap();
        let manager = SmapiManager::new(session, config, github).with_work_dir(root.join("work"));
        Fixture {
            _tmp: tmp,
            root,
            manager,
        }
    }

    #[test]
    fn test_default_game_path() {
        let f = fixture();
        assert_eq!(
            f.manager.game_path(),
            f.root.join("Steam/steamapps/common/Stardew Valley")
        );
        assert!(!f.manager.is_installed());
        assert!(!f.manager.is_enabled());
    }

    #[test]
    fn test_custom_game_path() {
        let f = fixture();
        let game = f.root.join("Games/Stardew");
        fs::create_dir_all(&game).unwrap();
        fs::write(game.join(LOADER_EXECUTABLE), "").unwrap();

        f.manager.set_custom_stardew_path(Some(game.clone())).unwrap();
        assert_eq!(f.manager.game_path(), game);
        assert!(f.manager.is_installed());
        assert_eq!(
            f.manager.launch_command(),
            format!("\"{}\" %command%", game.join(LOADER_EXECUTABLE).display())
        );
    }

    #[tokio::test]
    async fn test_toggle_is_enabled() {
        let f = fixture();
        assert!(f.manager.toggle_is_enabled().await.unwrap());
        assert!(f.manager.is_enabled());
        assert_eq!(
            f.manager
                .session()
                .launch_options(STARDEW_VALLEY_STEAM_APP_ID)
                .unwrap(),
            Some(f.manager.launch_command())
        );

        assert!(!f.manager.toggle_is_enabled().await.unwrap());
        assert_eq!(
            f.manager
                .session()
                .launch_options(STARDEW_VALLEY_STEAM_APP_ID)
                .unwrap()
                .as_deref(),
            Some("")
        );
    }

    #[tokio::test]
    async fn test_toggle_without_launch_options_key_keeps_state() {
        let f = fixture();
        let path = f.manager.session().local_config().unwrap().path().to_path_buf();
        let content = LOCALCONFIG.replace("\t\t\t\"LaunchOptions\"\t\t\"\"\n", "");
        fs::write(&path, &content).unwrap();

        assert!(!f.manager.toggle_is_enabled().await.unwrap());
        assert!(!f.manager.is_enabled());
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_user_change_refreshes_enabled() {
        let f = fixture();
        let user = f.manager.session().current_user().unwrap();
        let config = f.manager.session().local_config().unwrap();
        config
            .set_launch_options(STARDEW_VALLEY_STEAM_APP_ID, &f.manager.launch_command())
            .unwrap();
        // cached until the user is set again
        assert!(!f.manager.is_enabled());

        f.manager.session().set_current_user(Some(user));
        assert!(f.manager.is_enabled());
    }

    #[tokio::test]
    async fn test_mod_pack_is_recorded() {
        let f = fixture();
        let game = f.manager.game_path();
        fs::create_dir_all(game.join("Mods/Automate")).unwrap();
        let pack = f.root.join("pack.zip");

        f.manager.export_mod_pack(&pack).await.unwrap();
        f.manager
            .install_mod_pack(&pack, &crate::utils::never_cancelled())
            .await
            .unwrap();

        let recent = f.manager.recent_mod_packs();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].path, pack);
        assert!(f.manager.delete_recent_mod_pack(&pack).unwrap());
        assert!(f.manager.recent_mod_packs().is_empty());
    }
}
