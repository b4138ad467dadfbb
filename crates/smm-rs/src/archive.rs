//! Zip handling for installer packages and mod packs.

use crate::utils::{CancelSignal, is_cancelled};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;
use zip::{
    CompressionMethod,
    read::ZipArchive,
    write::{FileOptions, ZipWriter},
};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("walk directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("entry escapes the destination: {0}")]
    UnsafePath(String),
    #[error("extraction cancelled")]
    Cancelled,
}

/// Extracts every entry of `archive` below `dest`, in archive order.
///
/// A failing entry is logged and skipped, the remaining entries are still
/// extracted. `on_entry(processed, total)` is called once with `processed == 0`
/// and then after every successfully extracted entry, so `processed` never
/// decreases. Returns the number of extracted entries.
pub fn extract_all(
    archive: &Path,
    dest: &Path,
    cancel: &CancelSignal,
    mut on_entry: impl FnMut(usize, usize),
) -> Result<usize, ArchiveError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    fs::create_dir_all(dest)?;

    let total = zip.len();
    let mut processed = 0;
    on_entry(processed, total);

    for idx in 0..total {
        if is_cancelled(cancel) {
            return Err(ArchiveError::Cancelled);
        }
        match extract_entry(&mut zip, idx, dest) {
            Ok(path) => {
                trace!("extracted {}", path.display());
                processed += 1;
                on_entry(processed, total);
            }
            Err(e) => warn!("skipping entry #{idx} of {}: {e}", archive.display()),
        }
    }

    debug!("extracted {processed}/{total} entries into {}", dest.display());
    Ok(processed)
}

fn extract_entry(zip: &mut ZipArchive<File>, idx: usize, dest: &Path) -> Result<PathBuf, ArchiveError> {
    let mut entry = zip.by_index(idx)?;
    let relative = entry
        .enclosed_name()
        .ok_or_else(|| ArchiveError::UnsafePath(entry.name().to_owned()))?;
    let out_path = dest.join(relative);

    if entry.is_dir() {
        fs::create_dir_all(&out_path)?;
        return Ok(out_path);
    }

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(&out_path)?;
    io::copy(&mut entry, &mut out)?;

    #[cfg(unix)]
    if let Some(mode) = entry.unix_mode() {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
    }

    Ok(out_path)
}

/// Zips the contents of `src` into a new archive at `dest`.
///
/// Entry names are relative to `src` and always use `/` as separator.
pub fn zip_directory(src: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(dest)?);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| ArchiveError::UnsafePath(entry.path().display().to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options.clone())?;
        } else {
            writer.start_file(name, options.clone())?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut writer)?;
            written += 1;
        }
    }

    writer.finish()?.flush()?;
    debug!("zipped {written} files from {} into {}", src.display(), dest.display());
    Ok(written)
}
