use crate::steam_support::{SteamSupportError, imp};
use std::{ffi::OsStr, time::Duration};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tokio::time::{Instant, sleep};

const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(3);
const KILL_EXIT_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launch game via steam url
pub fn launch_game_via_steam(app_id: u32) -> Result<(), SteamSupportError> {
    let steam_url = format!("steam://rungameid/{app_id}");
    info!("launching {steam_url}");
    open::that_detached(&steam_url).inspect_err(|e| error!("failed to open {steam_url}: {e}"))?;
    Ok(())
}

/// Closes every running Steam client process.
pub async fn close_steam() -> usize {
    close_processes_named(imp::STEAM_PROCESS_NAME).await
}

/// Closes every process called exactly `name`, returning how many exited.
///
/// Processes that do not respond are killed right away. The others are asked
/// to close first and killed when they are still alive after three seconds.
/// A process that cannot be closed is logged and does not stop the others.
#[instrument(level = "debug")]
pub async fn close_processes_named(name: &str) -> usize {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let targets: Vec<(Pid, ProcessStatus)> = system
        .processes_by_exact_name(OsStr::new(name))
        .map(|process| (process.pid(), process.status()))
        .collect();
    debug!("found {} '{name}' processes", targets.len());

    let mut closed = 0;
    for (pid, status) in targets {
        match close_process(&mut system, pid, status).await {
            Ok(()) => {
                debug!("closed '{name}' process {pid}");
                closed += 1;
            }
            Err(e) => warn!("failed to close '{name}' process {pid}: {e}"),
        }
    }
    if closed > 0 {
        info!("closed {closed} '{name}' processes");
    }
    closed
}

async fn close_process(system: &mut System, pid: Pid, status: ProcessStatus) -> Result<(), SteamSupportError> {
    if !is_responsive(status) {
        debug!("killing unresponsive process {pid} ({status})");
        kill(system, pid);
        return wait_for_exit(system, pid, KILL_EXIT_TIMEOUT).await;
    }

    match imp::request_close(system, pid).await {
        Ok(()) => {
            debug!("sent close request to process {pid}");
            if wait_for_exit(system, pid, GRACEFUL_EXIT_TIMEOUT).await.is_ok() {
                return Ok(());
            }
        }
        Err(e) => warn!("close request to process {pid} failed: {e}"),
    }

    debug!("forcibly killing process {pid}");
    kill(system, pid);
    wait_for_exit(system, pid, KILL_EXIT_TIMEOUT).await
}

#[inline]
fn is_responsive(status: ProcessStatus) -> bool {
    !matches!(
        status,
        ProcessStatus::Zombie | ProcessStatus::Stop | ProcessStatus::Dead
    )
}

fn kill(system: &System, pid: Pid) {
    if let Some(process) = system.process(pid) {
        if !process.kill() {
            warn!("kill signal to process {pid} was not delivered");
        }
    }
}

async fn wait_for_exit(system: &mut System, pid: Pid, timeout: Duration) -> Result<(), SteamSupportError> {
    let deadline = Instant::now() + timeout;
    loop {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let gone = system
            .process(pid)
            .is_none_or(|p| matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead));
        if gone {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(SteamSupportError::ProcessNotTerminated(pid.as_u32()));
        }
        sleep(POLL_INTERVAL).await;
    }
}
