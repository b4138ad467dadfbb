use super::{SmapiError, SmapiManager};
use crate::{
    archive::{self, ArchiveError},
    github::{GitHubError, ReleaseAsset, SMAPI_REPO_NAME, SMAPI_REPO_OWNER},
    progress::{InstallEvent, ProgressReporter, StageProgress},
    utils::{CancelSignal, cancelled},
};
use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    select,
    sync::mpsc::UnboundedSender,
    task,
};
use uuid::Uuid;

const ASSET_PREFIX: &str = "SMAPI";
const ASSET_SUFFIX: &str = "installer.zip";

const DOWNLOAD_STAGE: &str = "Downloading SMAPI";
const EXTRACT_STAGE: &str = "Extracting SMAPI";
const INSTALL_STAGE: &str = "Installing SMAPI";

/// Location of the installer executable inside the extracted installer folder.
#[cfg(target_os = "windows")]
pub const INSTALLER_RELATIVE_PATH: &[&str] = &["internal", "windows", "SMAPI.Installer.exe"];
#[cfg(target_os = "macos")]
pub const INSTALLER_RELATIVE_PATH: &[&str] = &["internal", "macOS", "SMAPI.Installer"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const INSTALLER_RELATIVE_PATH: &[&str] = &["internal", "linux", "SMAPI.Installer"];

/// States of the install workflow, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    FetchingRelease,
    Downloading,
    Extracting,
    Installing,
    Verifying,
    Done,
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallState::Idle => "idle",
            InstallState::FetchingRelease => "fetching release",
            InstallState::Downloading => "downloading",
            InstallState::Extracting => "extracting",
            InstallState::Installing => "installing",
            InstallState::Verifying => "verifying",
            InstallState::Done => "done",
            InstallState::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No release or no installer asset was published.
    NothingToDo,
    Installed { tag: String },
}

/// The first asset that looks like the SMAPI installer package.
pub fn select_installer_asset(assets: &[ReleaseAsset]) -> Option<&ReleaseAsset> {
    assets
        .iter()
        .find(|asset| asset.name.starts_with(ASSET_PREFIX) && asset.name.ends_with(ASSET_SUFFIX))
}

/// Finds the installer executable below an extracted installer package.
pub fn locate_installer(extract_dir: &Path) -> Result<PathBuf, SmapiError> {
    let mut candidates = std::fs::read_dir(extract_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|ty| ty.is_dir()))
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| name.contains(ASSET_PREFIX) && name.contains("installer"))
        })
        .collect::<Vec<_>>();
    candidates.sort();

    let Some(dir) = candidates.into_iter().next() else {
        error!("no installer directory in {}", extract_dir.display());
        return Err(SmapiError::InstallerNotFound(extract_dir.to_path_buf()));
    };
    let installer: PathBuf = INSTALLER_RELATIVE_PATH
        .iter()
        .fold(dir, |path, part| path.join(part));
    if !installer.is_file() {
        error!("installer not found at {}", installer.display());
        return Err(SmapiError::InstallerNotFound(installer));
    }
    Ok(installer)
}

/// Files created by one install run, removed whatever the outcome.
#[derive(Debug, Default)]
struct Scratch {
    archive: Option<PathBuf>,
    extract_dir: Option<PathBuf>,
}

impl Scratch {
    async fn cleanup(self) {
        if let Some(archive) = self.archive {
            match fs::remove_file(&archive).await {
                Ok(()) => debug!("removed {}", archive.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove {}: {e}", archive.display()),
            }
        }
        if let Some(dir) = self.extract_dir {
            match fs::remove_dir_all(&dir).await {
                Ok(()) => debug!("removed {}", dir.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to remove {}: {e}", dir.display()),
            }
        }
    }
}

impl SmapiManager {
    /// Downloads the latest SMAPI release and runs its installer against the
    /// game folder.
    ///
    /// State transitions and stage progress go to `events`. Temporary files
    /// are removed whatever the outcome. After a successful install SMAPI is
    /// made the launch wrapper if it was not already.
    #[instrument(skip_all)]
    pub async fn install_latest(
        &self,
        events: Option<UnboundedSender<InstallEvent>>,
        cancel: &CancelSignal,
    ) -> Result<InstallOutcome, SmapiError> {
        let reporter = ProgressReporter::new(events);
        let mut scratch = Scratch::default();
        let result = self.run_install(&reporter, cancel, &mut scratch).await;
        scratch.cleanup().await;

        match &result {
            Ok(InstallOutcome::Installed { tag }) => {
                info!("SMAPI {tag} installed into {}", self.game_path().display());
                reporter.state(InstallState::Done);
            }
            Ok(InstallOutcome::NothingToDo) => reporter.state(InstallState::Idle),
            Err(e) => {
                error!("SMAPI installation failed: {e}");
                reporter.state(InstallState::Failed);
            }
        }

        if matches!(result, Ok(InstallOutcome::Installed { .. })) && !self.is_enabled() {
            info!("enabling SMAPI launch options");
            if let Err(e) = self.toggle_is_enabled().await {
                warn!("failed to enable SMAPI after install: {e}");
            }
        }
        result
    }

    async fn run_install(
        &self,
        reporter: &ProgressReporter,
        cancel: &CancelSignal,
        scratch: &mut Scratch,
    ) -> Result<InstallOutcome, SmapiError> {
        let mut cancel = cancel.clone();

        reporter.state(InstallState::FetchingRelease);
        let release = select! {
            biased;
            _ = cancelled(&mut cancel) => return Err(SmapiError::Cancelled),
            release = self.github.latest_release(SMAPI_REPO_OWNER, SMAPI_REPO_NAME) => release,
        };
        let Some(release) = release.map_err(SmapiError::ReleaseLookup)? else {
            warn!("no SMAPI release published");
            return Ok(InstallOutcome::NothingToDo);
        };
        let Some(asset) = select_installer_asset(&release.assets) else {
            warn!("release {} has no installer asset", release.tag_name);
            return Ok(InstallOutcome::NothingToDo);
        };
        info!("latest SMAPI release: {} ({})", release.tag_name, asset.name);

        reporter.state(InstallState::Downloading);
        fs::create_dir_all(&self.work_dir).await?;
        let archive_path = self.work_dir.join(format!("smapi-{}.zip", Uuid::new_v4().simple()));
        scratch.archive = Some(archive_path.clone());
        let mut stage = reporter.stage(DOWNLOAD_STAGE, 100);
        self.github
            .download_asset(asset, &archive_path, &cancel, |fraction| {
                stage.advance_to((fraction * 100.0).round() as i64)
            })
            .await
            .map_err(|e| match e {
                GitHubError::Cancelled => SmapiError::Cancelled,
                e => SmapiError::Download(e),
            })?;

        reporter.state(InstallState::Extracting);
        let suffix = Uuid::new_v4().simple().to_string();
        let extract_dir = self.work_dir.join(format!("SMAPI_Installer_{}", &suffix[..8]));
        scratch.extract_dir = Some(extract_dir.clone());
        extract_with_progress(reporter, archive_path, extract_dir.clone(), cancel.clone()).await?;

        reporter.state(InstallState::Installing);
        let mut stage = reporter.stage(INSTALL_STAGE, 100);
        let installer = locate_installer(&extract_dir)?;
        run_installer(&installer, &self.game_path(), &cancel).await?;
        stage.advance_to(100);

        reporter.state(InstallState::Verifying);
        let loader = self.loader_path();
        if !loader.is_file() {
            error!("SMAPI loader missing after install: {}", loader.display());
            return Err(SmapiError::VerificationFailed(loader));
        }
        self.refresh_installed();

        Ok(InstallOutcome::Installed {
            tag: release.tag_name,
        })
    }
}

async fn extract_with_progress(
    reporter: &ProgressReporter,
    archive: PathBuf,
    dest: PathBuf,
    cancel: CancelSignal,
) -> Result<usize, SmapiError> {
    let reporter = reporter.clone();
    let extracted = task::spawn_blocking(move || {
        let mut stage: Option<StageProgress<'_>> = None;
        archive::extract_all(&archive, &dest, &cancel, |processed, total| {
            stage
                .get_or_insert_with(|| reporter.stage(EXTRACT_STAGE, total as i64))
                .advance_to(processed as i64)
        })
    })
    .await?;

    extracted.map_err(|e| match e {
        ArchiveError::Cancelled => SmapiError::Cancelled,
        e => SmapiError::Archive(e),
    })
}

async fn run_installer(installer: &Path, game_path: &Path, cancel: &CancelSignal) -> Result<(), SmapiError> {
    info!("running {} for {}", installer.display(), game_path.display());
    let mut command = Command::new(installer);
    command
        .arg("--install")
        .arg("--no-prompt")
        .arg("--game-path")
        .arg(game_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = installer.parent() {
        command.current_dir(dir);
    }
    let mut child = command
        .spawn()
        .inspect_err(|e| error!("failed to start installer: {e}"))
        .map_err(SmapiError::InstallerStart)?;

    let stdout = child
        .stdout
        .take()
        .map(|out| tokio::spawn(log_lines(out, false)));
    let stderr = child
        .stderr
        .take()
        .map(|err| tokio::spawn(log_lines(err, true)));

    let mut cancel = cancel.clone();
    let status = select! {
        biased;
        _ = cancelled(&mut cancel) => {
            warn!("cancelling installer");
            child.kill().await.inspect_err(|e| warn!("failed to kill installer: {e}")).ok();
            return Err(SmapiError::Cancelled);
        }
        status = child.wait() => status?,
    };
    for task in [stdout, stderr].into_iter().flatten() {
        task.await.ok();
    }

    if !status.success() {
        error!("installer exited with {status}");
        return Err(SmapiError::InstallerFailed(status.code()));
    }
    debug!("installer exited successfully");
    Ok(())
}

async fn log_lines(stream: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) if is_stderr => error!(target: "smapi_installer", "{line}"),
            Ok(Some(line)) => info!(target: "smapi_installer", "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!("failed to read installer output: {e}");
                break;
            }
        }
    }
}
