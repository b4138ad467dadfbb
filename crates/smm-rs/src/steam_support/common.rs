use crate::{
    steam_support::{SteamSupportError, SteamUser, imp},
    vdf::{VdfDocument, VdfValue},
};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const LOCAL_CONFIG_FILE_NAME: &str = "localconfig.vdf";

/// Picks the Steam install path, preferring `custom` when set.
///
/// Without a custom path the machine is probed (see [`probe_steam_path`]);
/// when nothing is found a platform default is returned without checking
/// that it exists.
pub fn resolve_steam_path(custom: Option<&Path>) -> PathBuf {
    if let Some(custom) = custom {
        debug!("using custom steam path {}", custom.display());
        return custom.to_path_buf();
    }

    probe_steam_path(
        imp::registry_steam_paths(),
        |key| std::env::var_os(key),
        imp::conventional_steam_paths(),
    )
    .unwrap_or_else(unchecked_fallback)
}

fn unchecked_fallback() -> PathBuf {
    let fallback = imp::fallback_steam_path();
    warn!("steam installation not found, falling back to {}", fallback.display());
    fallback
}

/// Returns the first existing directory among, in order: the `registry`
/// candidates, the `STEAM_PATH` variable, `Steam` below the Program Files
/// directory, and the `conventional` candidates.
pub fn probe_steam_path(
    registry: impl IntoIterator<Item = PathBuf>,
    env: impl Fn(&str) -> Option<OsString>,
    conventional: impl IntoIterator<Item = PathBuf>,
) -> Option<PathBuf> {
    let non_empty = |value: OsString| (!value.is_empty()).then(|| PathBuf::from(value));
    let program_files = env("ProgramFiles(x86)")
        .and_then(non_empty)
        .or_else(|| env("ProgramFiles").and_then(non_empty))
        .map(|dir| dir.join("Steam"));

    registry
        .into_iter()
        .chain(env("STEAM_PATH").and_then(non_empty))
        .chain(program_files)
        .chain(conventional)
        .inspect(|candidate| trace!("probing steam path {}", candidate.display()))
        .find(|candidate| candidate.is_dir())
        .inspect(|found| debug!("found steam at {}", found.display()))
}

/// Finds the installation path for a game given its app ID.
pub fn find_game_path_for_app(
    steam_root: impl AsRef<Path>,
    app_id: u32,
) -> Result<PathBuf, SteamSupportError> {
    #[derive(Debug, Deserialize)]
    struct LibraryFolders {
        libraryfolders: Vec<Library>,
    }
    #[derive(Debug, Deserialize)]
    struct Library {
        path: String,
        apps: BTreeMap<u32, u64>,
    }

    let library_folders = steam_root
        .as_ref()
        .join("steamapps")
        .join("libraryfolders.vdf");
    let vdf_content = fs::read_to_string(library_folders)?;
    let libraries: LibraryFolders = vdf_reader::from_str(&vdf_content)?;

    let library_path = libraries
        .libraryfolders
        .iter()
        .find(|library| library.apps.contains_key(&app_id))
        .map(|library| Path::new(&library.path))
        .ok_or(SteamSupportError::AppNotFound(app_id))?;

    #[derive(Debug, Deserialize)]
    struct AppStateDe {
        #[serde(rename = "AppState")]
        app_state: AppState,
    }
    #[derive(Debug, Deserialize)]
    struct AppState {
        installdir: String,
    }

    let steam_apps = library_path.join("steamapps");
    let manifest_path = steam_apps.join(format!("appmanifest_{app_id}.acf"));
    if !manifest_path.exists() {
        return Err(SteamSupportError::AppNotFound(app_id));
    }

    let manifest: AppStateDe = vdf_reader::from_str(&fs::read_to_string(manifest_path)?)?;
    let game_path = steam_apps.join("common").join(manifest.app_state.installdir);
    if !game_path.exists() {
        return Err(SteamSupportError::AppNotFound(app_id));
    }

    Ok(game_path)
}

/// Lists `app id -> name` for every app manifest in the main library.
///
/// Unreadable manifests are logged and skipped.
pub fn installed_games(steam_root: impl AsRef<Path>) -> Result<BTreeMap<u32, String>, SteamSupportError> {
    #[derive(Debug, Deserialize)]
    struct ManifestDe {
        #[serde(rename = "AppState")]
        app_state: Manifest,
    }
    #[derive(Debug, Deserialize)]
    struct Manifest {
        appid: u32,
        name: String,
    }

    let steam_apps = steam_root.as_ref().join("steamapps");
    let mut games = BTreeMap::new();
    for entry in fs::read_dir(&steam_apps)? {
        let path = entry?.path();
        let is_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("appmanifest_") && name.ends_with(".acf"));
        if !is_manifest {
            continue;
        }

        let parsed = fs::read_to_string(&path)
            .map_err(SteamSupportError::from)
            .and_then(|content| Ok(vdf_reader::from_str::<ManifestDe>(&content)?));
        match parsed {
            Ok(manifest) => {
                games.insert(manifest.app_state.appid, manifest.app_state.name);
            }
            Err(e) => warn!("skipping app manifest {}: {e}", path.display()),
        }
    }
    Ok(games)
}

/// Every `localconfig.vdf` below `dir`, ordered by path.
///
/// Fails when `dir` does not exist or holds no config at all.
pub fn find_local_configs(dir: &Path) -> Result<Vec<PathBuf>, SteamSupportError> {
    if !dir.is_dir() {
        error!("steam userdata directory not found: {}", dir.display());
        return Err(SteamSupportError::UserDataNotFound(dir.to_path_buf()));
    }

    let mut configs = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == LOCAL_CONFIG_FILE_NAME {
            configs.push(entry.into_path());
        }
    }

    if configs.is_empty() {
        error!("no {LOCAL_CONFIG_FILE_NAME} found in {}", dir.display());
        return Err(SteamSupportError::LocalConfigNotFound(dir.to_path_buf()));
    }
    debug!("found {} local configs in {}", configs.len(), dir.display());
    Ok(configs)
}

/// Extracts the account owning a parsed `localconfig.vdf`.
///
/// The id is the first key of the `friends` object and the nickname is its
/// first `PersonaName`. Returns `None` if either is missing or empty.
pub fn user_from_local_config(doc: &VdfDocument) -> Option<SteamUser> {
    let friends = doc.find_entry("friends").and_then(VdfValue::as_object)?;
    let (id, _) = friends.first()?;
    let nickname = friends
        .find_entry("PersonaName")
        .and_then(VdfValue::as_str)?
        .trim_matches('"');

    if id.is_empty() || nickname.is_empty() {
        return None;
    }
    Some(SteamUser {
        id: id.to_owned(),
        nickname: nickname.to_owned(),
    })
}
