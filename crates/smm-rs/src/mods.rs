//! The `Mods` and `DisabledMods` folders of a game installation.

use crate::{
    archive::{self, ArchiveError},
    utils::CancelSignal,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const MODS_FOLDER: &str = "Mods";
pub const DISABLED_MODS_FOLDER: &str = "DisabledMods";

#[derive(Debug, thiserror::Error)]
pub enum ModsError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("invalid mod name: {0:?}")]
    InvalidName(String),
    #[error("mod '{0}' not found")]
    NotFound(String),
    #[error("mods folder not found: {}", .0.display())]
    MissingModsFolder(PathBuf),
}

/// A mod folder, enabled when it lives in `Mods`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod {
    pub name: String,
    pub is_enabled: bool,
}

/// Lists enabled and disabled mods, ordered by name.
pub fn list_mods(game_path: &Path) -> Result<Vec<Mod>, ModsError> {
    let mut mods = Vec::new();
    for (folder, is_enabled) in [(MODS_FOLDER, true), (DISABLED_MODS_FOLDER, false)] {
        let dir = game_path.join(folder);
        if !dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                mods.push(Mod {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    is_enabled,
                });
            }
        }
    }
    mods.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(mods)
}

/// Moves a mod folder between `Mods` and `DisabledMods`.
///
/// Both folders are created when missing. A mod that is already where it
/// should be is left alone.
pub fn set_mod_enabled(game_path: &Path, name: &str, enabled: bool) -> Result<(), ModsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ModsError::InvalidName(name.to_owned()));
    }

    let mods = game_path.join(MODS_FOLDER);
    let disabled = game_path.join(DISABLED_MODS_FOLDER);
    fs::create_dir_all(&mods)?;
    fs::create_dir_all(&disabled)?;

    let (from, to) = if enabled {
        (disabled.join(name), mods.join(name))
    } else {
        (mods.join(name), disabled.join(name))
    };
    if !from.is_dir() {
        if to.is_dir() {
            debug!("mod '{name}' is already {}", if enabled { "enabled" } else { "disabled" });
            return Ok(());
        }
        return Err(ModsError::NotFound(name.to_owned()));
    }

    fs::rename(&from, &to)?;
    info!("moved mod '{name}' to {}", to.display());
    Ok(())
}

/// Writes the contents of `Mods` into a new zip at `dest`, replacing any
/// existing file.
pub fn export_mod_pack(game_path: &Path, dest: &Path) -> Result<usize, ModsError> {
    let mods = game_path.join(MODS_FOLDER);
    if !mods.is_dir() {
        return Err(ModsError::MissingModsFolder(mods));
    }
    if dest.exists() {
        fs::remove_file(dest)?;
    }
    let count = archive::zip_directory(&mods, dest)?;
    info!("exported {count} files to {}", dest.display());
    Ok(count)
}

/// Replaces every installed mod with the contents of `pack`.
///
/// Both mod folders are emptied (or created), then the pack is extracted into
/// `Mods`.
pub fn install_mod_pack(game_path: &Path, pack: &Path, cancel: &CancelSignal) -> Result<usize, ModsError> {
    let mods = game_path.join(MODS_FOLDER);
    clear_or_create(&mods)?;
    clear_or_create(&game_path.join(DISABLED_MODS_FOLDER))?;

    let count = archive::extract_all(pack, &mods, cancel, |_, _| {})?;
    info!("installed mod pack {} ({count} entries)", pack.display());
    Ok(count)
}

fn clear_or_create(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        return fs::create_dir_all(dir);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
