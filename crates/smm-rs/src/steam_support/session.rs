use crate::{
    config::ConfigService,
    steam_support::{
        LocalConfig, SteamSupportError, SteamUser,
        common::{find_local_configs, resolve_steam_path, user_from_local_config},
        imp,
        process::{close_processes_named, launch_game_via_steam},
    },
    vdf,
};
use std::{
    fs,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};
use tokio::sync::watch;

/// The local Steam installation and the user whose settings are edited.
#[derive(Debug)]
pub struct SteamSession {
    config: Arc<ConfigService>,
    steam_path: RwLock<PathBuf>,
    current_user: watch::Sender<Option<SteamUser>>,
    steam_process: String,
}

impl SteamSession {
    /// Resolves the Steam path and selects the first local user, if any.
    pub fn new(config: Arc<ConfigService>) -> Self {
        let steam_path = resolve_steam_path(config.get().custom_steam_path.as_deref());
        let session = Self {
            config,
            steam_path: RwLock::new(steam_path),
            current_user: watch::channel(None).0,
            steam_process: imp::STEAM_PROCESS_NAME.to_owned(),
        };

        match session.local_users() {
            Ok(users) => session.set_current_user(users.into_iter().next()),
            Err(e) => warn!("no local steam user available: {e}"),
        }
        info!("steam session initialized with path: {}", session.steam_path().display());
        session
    }

    /// Overrides the process name matched by [`SteamSession::close_steam`].
    pub fn with_steam_process_name(mut self, name: impl Into<String>) -> Self {
        self.steam_process = name.into();
        self
    }

    pub fn steam_path(&self) -> PathBuf {
        self.steam_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persists a custom Steam path (or clears it) and resolves the path again.
    pub fn set_custom_steam_path(&self, path: Option<PathBuf>) -> Result<(), SteamSupportError> {
        info!("setting custom steam path: {path:?}");
        self.config
            .update(|config| config.custom_steam_path = path.clone())?;

        let resolved = resolve_steam_path(path.as_deref());
        *self.steam_path.write().unwrap_or_else(PoisonError::into_inner) = resolved;
        info!("steam path updated to: {}", self.steam_path().display());
        Ok(())
    }

    /// Every user with a readable `localconfig.vdf` below `userdata`.
    ///
    /// Files that cannot be read or carry no user are logged and skipped.
    pub fn local_users(&self) -> Result<Vec<SteamUser>, SteamSupportError> {
        let configs = find_local_configs(&self.steam_path().join("userdata"))?;
        let users: Vec<SteamUser> = configs
            .iter()
            .filter_map(|path| {
                let content = fs::read_to_string(path)
                    .inspect_err(|e| error!("failed to read user config {}: {e}", path.display()))
                    .ok()?;
                let user = user_from_local_config(&vdf::parse(&content));
                if user.is_none() {
                    warn!("no valid user data in {}", path.display());
                }
                user
            })
            .inspect(|user| debug!("found steam user {user}"))
            .collect();
        info!("retrieved {} local steam users", users.len());
        Ok(users)
    }

    pub fn current_user(&self) -> Option<SteamUser> {
        self.current_user.borrow().clone()
    }

    /// Replaces the current user.
    ///
    /// Subscribers are notified whenever a user is set, even the same one
    /// again; clearing the user is silent.
    pub fn set_current_user(&self, user: Option<SteamUser>) {
        if let Some(user) = &user {
            info!("current steam user: {user}");
        }
        self.current_user.send_if_modified(|current| {
            let notify = user.is_some();
            *current = user;
            notify
        });
    }

    /// A receiver that sees every later [`SteamSession::set_current_user`].
    pub fn subscribe(&self) -> watch::Receiver<Option<SteamUser>> {
        self.current_user.subscribe()
    }

    /// The config of the current user.
    pub fn local_config(&self) -> Result<LocalConfig, SteamSupportError> {
        let user = self.current_user().ok_or_else(|| {
            error!("no user selected when resolving local config path");
            SteamSupportError::NoUserSelected
        })?;
        LocalConfig::locate(&self.steam_path(), &user)
    }

    pub fn launch_options(&self, app_id: u32) -> Result<Option<String>, SteamSupportError> {
        self.local_config()?.launch_options(app_id)
    }

    /// See [`LocalConfig::set_launch_options`]. Close Steam first, it rewrites
    /// the file on exit.
    pub fn set_launch_options(&self, app_id: u32, value: &str) -> Result<bool, SteamSupportError> {
        self.local_config()?.set_launch_options(app_id, value)
    }

    /// Asks Steam to start `app_id`, without waiting for the game.
    pub fn launch_game(&self, app_id: u32) -> Result<(), SteamSupportError> {
        launch_game_via_steam(app_id)
    }

    pub async fn close_steam(&self) -> usize {
        info!("closing steam");
        close_processes_named(&self.steam_process).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_user(steam: &Path, id: &str, persona: &str) {
        let dir = steam.join("userdata").join(id).join("config");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("localconfig.vdf"),
            format!(
                "\"UserLocalConfigStore\"\n{{\n\t\"friends\"\n\t{{\n\t\t\"{id}\"\n\t\t{{\n\t\t}}\n\t\t\"PersonaName\"\t\t\"{persona}\"\n\t}}\n}}\n"
            ),
        )
        .unwrap();
    }

    fn session_for(tmp: &Path) -> SteamSession {
        let steam = tmp.join("Steam");
        let config = Arc::new(ConfigService::load(tmp.join("config.json")));
        config
            .update(|c| c.custom_steam_path = Some(steam))
            .unwrap();
        SteamSession::new(config)
    }

    #[test]
    fn test_first_user_is_selected() {
        let tmp = tempfile::tempdir().unwrap();
        write_user(&tmp.path().join("Steam"), "20", "Sebastian");
        write_user(&tmp.path().join("Steam"), "10", "Penny");
        // unreadable users are skipped
        let broken = tmp.path().join("Steam/userdata/30/config");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("localconfig.vdf"), "\"nothing\"\t\"here\"\n").unwrap();

        let session = session_for(tmp.path());
        let users = session.local_users().unwrap();
        assert_eq!(
            users.iter().map(|u| u.nickname.as_str()).collect::<Vec<_>>(),
            ["Penny", "Sebastian"]
        );
        assert_eq!(session.current_user(), Some(users[0].clone()));
    }

    #[test]
    fn test_without_userdata() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session_for(tmp.path());
        assert_eq!(session.current_user(), None);
        assert!(matches!(
            session.launch_options(413150),
            Err(SteamSupportError::NoUserSelected)
        ));
    }

    #[test]
    fn test_user_change_notifies_subscribers() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session_for(tmp.path());
        let mut rx = session.subscribe();
        assert!(!rx.has_changed().unwrap());

        let user = SteamUser {
            id: "1".into(),
            nickname: "Leah".into(),
        };
        session.set_current_user(Some(user.clone()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(user.clone()));

        // same user again still notifies
        session.set_current_user(Some(user));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        session.set_current_user(None);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn test_set_custom_steam_path() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session_for(tmp.path());
        let other = tmp.path().join("Other");

        session.set_custom_steam_path(Some(other.clone())).unwrap();
        assert_eq!(session.steam_path(), other);
        assert_eq!(
            ConfigService::load(tmp.path().join("config.json")).get().custom_steam_path,
            Some(other)
        );
    }
}
