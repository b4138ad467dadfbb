use std::{env, io, path::PathBuf};
use sysinfo::{Pid, Signal, System};

pub const STEAM_PROCESS_NAME: &str = "steam";

const HOME_CANDIDATES: [&str; 3] = [
    ".steam/steam",
    ".local/share/Steam",
    ".var/app/com.valvesoftware.Steam/.steam/steam",
];

/// There is no registry outside Windows.
pub fn registry_steam_paths() -> Vec<PathBuf> {
    Vec::new()
}

/// Native and Flatpak install locations below `$HOME`.
pub fn conventional_steam_paths() -> Vec<PathBuf> {
    let Some(home) = env::var_os("HOME") else {
        warn!("HOME environment variable not set");
        return Vec::new();
    };
    let home = PathBuf::from(home);
    HOME_CANDIDATES.iter().map(|c| home.join(c)).collect()
}

pub fn fallback_steam_path() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
        .join(HOME_CANDIDATES[1])
}

/// Sends `SIGTERM`.
pub async fn request_close(system: &System, pid: Pid) -> io::Result<()> {
    let process = system
        .process(pid)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("process {pid} is gone")))?;
    match process.kill_with(Signal::Term) {
        Some(true) => Ok(()),
        Some(false) => Err(io::Error::other(format!("failed to signal process {pid}"))),
        None => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "SIGTERM is not supported on this platform",
        )),
    }
}
