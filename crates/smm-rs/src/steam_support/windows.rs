use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};
use sysinfo::{Disks, Pid, System};
use winreg::{
    RegKey,
    enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE},
};

pub const STEAM_PROCESS_NAME: &str = "steam.exe";

const FALLBACK_STEAM_PATH: &str = r"C:\Program Files (x86)\Steam";

/// Steam install paths recorded in the registry, most specific first.
pub fn registry_steam_paths() -> Vec<PathBuf> {
    let lookups = [
        (HKEY_LOCAL_MACHINE, r"SOFTWARE\WOW6432Node\Valve\Steam", "InstallPath"),
        (HKEY_LOCAL_MACHINE, r"SOFTWARE\Valve\Steam", "InstallPath"),
        (HKEY_CURRENT_USER, r"Software\Valve\Steam", "SteamPath"),
    ];

    lookups
        .into_iter()
        .filter_map(|(hive, subkey, value)| {
            let path: OsString = RegKey::predef(hive)
                .open_subkey(subkey)
                .and_then(|key| key.get_value(value))
                .inspect_err(|e| trace!("registry {subkey}\\{value}: {e}"))
                .ok()?;
            // SteamPath is stored with forward slashes
            Some(Path::new(&path).components().collect())
        })
        .collect()
}

/// Conventional install locations on every fixed drive.
///
/// Removable and network drives are not probed.
pub fn conventional_steam_paths() -> Vec<PathBuf> {
    let disks = Disks::new_with_refreshed_list();
    let mut roots: Vec<PathBuf> = disks
        .list()
        .iter()
        .filter(|disk| !disk.is_removable())
        .map(|disk| disk.mount_point().to_path_buf())
        .collect();
    roots.sort();
    roots.dedup();
    candidates_below(roots)
}

fn candidates_below(roots: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    const SUFFIXES: [&str; 5] = [
        r"Program Files\Steam",
        r"Program Files (x86)\Steam",
        r"Games\Steam",
        "Steam",
        r"Portable Steam\Steam",
    ];

    roots
        .into_iter()
        .flat_map(|root| SUFFIXES.iter().map(move |suffix| root.join(suffix)))
        .collect()
}

pub fn fallback_steam_path() -> PathBuf {
    PathBuf::from(FALLBACK_STEAM_PATH)
}

/// Asks the process to close its windows, like clicking the close button.
pub async fn request_close(_system: &System, pid: Pid) -> io::Result<()> {
    let status = tokio::process::Command::new("taskkill")
        .arg("/PID")
        .arg(pid.to_string())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}
