use crate::{Cli, Command};
use directories::ProjectDirs;
use eyre::{Context, ContextCompat};
use smm_rs::{
    ConfigService, GitHubClient, InstallEvent, InstallOutcome, SmapiManager, SteamSession,
    config::CONFIG_FILE_NAME, utils::CancelSignal,
};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

/// Builds the services once and runs `cli.command` against them.
pub async fn run(cli: Cli, dirs: &ProjectDirs) -> eyre::Result<()> {
    let config = Arc::new(ConfigService::load(dirs.config_dir().join(CONFIG_FILE_NAME)));
    let session = Arc::new(SteamSession::new(config.clone()));

    if let Some(id) = &cli.user {
        let user = session
            .local_users()
            .context("failed to list local steam users")?
            .into_iter()
            .find(|user| &user.id == id)
            .with_context(|| format!("no local steam user with id {id}"))?;
        session.set_current_user(Some(user));
    }

    let github = GitHubClient::new(config.get().github_token.as_deref())
        .context("failed to create the GitHub client")?;
    let manager = SmapiManager::new(session.clone(), config, github);

    match cli.command {
        Command::Users => {
            let current = session.current_user();
            for user in session.local_users().context("failed to list local steam users")? {
                let marker = if current.as_ref() == Some(&user) { '*' } else { ' ' };
                println!("{marker} {user}");
            }
        }
        Command::Status => status(&manager),
        Command::Install => install(&manager).await?,
        Command::Toggle => {
            let enabled = manager
                .toggle_is_enabled()
                .await
                .context("failed to change the launch options")?;
            println!("SMAPI is now {}", if enabled { "enabled" } else { "disabled" });
        }
        Command::Launch => manager.launch_game().context("failed to launch the game")?,
        Command::Mods => {
            for m in manager.mods().context("failed to list mods")? {
                println!("[{}] {}", if m.is_enabled { 'x' } else { ' ' }, m.name);
            }
        }
        Command::EnableMod { name } => manager
            .set_mod_enabled(&name, true)
            .with_context(|| format!("failed to enable {name}"))?,
        Command::DisableMod { name } => manager
            .set_mod_enabled(&name, false)
            .with_context(|| format!("failed to disable {name}"))?,
        Command::Export { path } => {
            let count = manager
                .export_mod_pack(&path)
                .await
                .with_context(|| format!("failed to export mods to {}", path.display()))?;
            println!("exported {count} files to {}", path.display());
        }
        Command::Import { path } => {
            let (cancel, ctrl_c) = cancel_on_ctrl_c();
            let res = manager.install_mod_pack(&path, &cancel).await;
            ctrl_c.abort();
            let count = res.with_context(|| format!("failed to install {}", path.display()))?;
            println!("installed {count} entries from {}", path.display());
        }
        Command::Recent => {
            for pack in manager.recent_mod_packs() {
                println!("{}  {}", pack.last_install_time, pack.path.display());
            }
        }
        Command::ForgetPack { path } => {
            if !manager
                .delete_recent_mod_pack(&path)
                .context("failed to update the recent mod packs")?
            {
                println!("{} is not a recent mod pack", path.display());
            }
        }
        Command::SetSteamPath { path } => {
            session
                .set_custom_steam_path(path)
                .context("failed to save the steam path")?;
            manager.refresh();
            println!("steam path: {}", session.steam_path().display());
        }
        Command::SetGamePath { path } => {
            manager
                .set_custom_stardew_path(path)
                .context("failed to save the game path")?;
            println!("game path: {}", manager.game_path().display());
        }
    }
    Ok(())
}

fn status(manager: &SmapiManager) {
    let session = manager.session();
    println!("steam path:   {}", session.steam_path().display());
    match session.current_user() {
        Some(user) => println!("steam user:   {user}"),
        None => println!("steam user:   <none>"),
    }
    println!("game path:    {}", manager.game_path().display());
    println!("SMAPI:        {}", if manager.is_installed() { "installed" } else { "not installed" });
    println!("launch SMAPI: {}", if manager.is_enabled() { "yes" } else { "no" });
}

async fn install(manager: &SmapiManager) -> eyre::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                InstallEvent::State(state) => info!("install: {state}"),
                InstallEvent::Progress(progress) => match progress.fraction() {
                    Some(fraction) => info!(
                        "{}: {}/{} ({:.0}%)",
                        progress.stage_name,
                        progress.processed_tasks_quantity,
                        progress.total_tasks_quantity,
                        fraction * 100.0
                    ),
                    None => info!("{}: {}", progress.stage_name, progress.processed_tasks_quantity),
                },
            }
        }
    });

    let (cancel, ctrl_c) = cancel_on_ctrl_c();
    let res = manager.install_latest(Some(tx), &cancel).await;
    ctrl_c.abort();
    printer.await.ok();

    match res.context("failed to install SMAPI")? {
        InstallOutcome::NothingToDo => println!("no SMAPI installer release found, nothing to do"),
        InstallOutcome::Installed { tag } => {
            println!("installed SMAPI {tag} into {}", manager.game_path().display())
        }
    }
    Ok(())
}

/// A cancel signal that fires on the first Ctrl-C.
fn cancel_on_ctrl_c() -> (CancelSignal, JoinHandle<()>) {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            tx.send(true).ok();
            // keep the sender alive until the operation observed it
            std::future::pending::<()>().await;
        }
    });
    (rx, handle)
}
