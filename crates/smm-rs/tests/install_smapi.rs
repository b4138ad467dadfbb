#![cfg(unix)]

use smm_rs::{
    ConfigService, GitHubClient, InstallEvent, InstallOutcome, InstallState, SmapiError,
    SmapiManager, STARDEW_VALLEY_STEAM_APP_ID, SteamSession,
    smapi::INSTALLER_RELATIVE_PATH,
    utils::never_cancelled,
};
use std::{
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};
use zip::{ZipWriter, write::SimpleFileOptions};

const LOCALCONFIG: &str = "\"UserLocalConfigStore\"
{
\t\"friends\"
\t{
\t\t\"7\"
\t\t{
\t\t}
\t\t\"PersonaName\"\t\t\"Abigail\"
\t}
\t\"Software\"
\t{
\t\t\"Valve\"
\t\t{
\t\t\t\"Steam\"
\t\t\t{
\t\t\t\t\"apps\"
\t\t\t\t{
\t\t\t\t\t\"413150\"
\t\t\t\t\t{
\t\t\t\t\t\t\"LastPlayed\"\t\t\"1700000000\"
\t\t\t\t\t\t\"LaunchOptions\"\t\t\"\"
\t\t\t\t\t}
\t\t\t\t}
\t\t\t}
\t\t}
\t}
}
";

const INSTALLER_SCRIPT: &str = r#"#!/bin/sh
[ "$1" = "--install" ] && [ "$2" = "--no-prompt" ] && [ "$3" = "--game-path" ] || exit 2
mkdir -p "$4"
touch "$4/StardewModdingAPI"
echo "SMAPI installed into $4"
"#;

const ASSET_NAME: &str = "SMAPI-4.1.10-installer.zip";

#[ctor::ctor]
fn setup_test() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .init();
}

struct Setup {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    server: MockServer,
    manager: SmapiManager,
}

impl Setup {
    async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let user_dir = root.join("Steam/userdata/7/config");
        fs::create_dir_all(&user_dir).unwrap();
        fs::write(user_dir.join("localconfig.vdf"), LOCALCONFIG).unwrap();

        let config = Arc::new(ConfigService::load(root.join("modmanagerconfig.json")));
        config
            .update(|c| {
                c.custom_steam_path = Some(root.join("Steam"));
                c.custom_stardew_path = Some(root.join("Stardew Valley"));
            })
            .unwrap();
        let session = Arc::new(
            SteamSession::new(config.clone()).with_steam_process_name("smm-test-no-such-steam"),
        );

        let server = MockServer::start().await;
        let github = GitHubClient::with_api_url(Url::parse(&server.uri()).unwrap(), None).unwrap();
        let manager = SmapiManager::new(session, config, github).with_work_dir(root.join("work"));

        Self {
            _tmp: tmp,
            root,
            server,
            manager,
        }
    }

    async fn serve_release(&self, package: Vec<u8>) {
        let download = format!("{}/download/{ASSET_NAME}", self.server.uri());
        Mock::given(method("GET"))
            .and(path("/repos/Pathoschild/SMAPI/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "4.1.10",
                "assets": [
                    { "name": "README.md", "browser_download_url": format!("{}/download/README.md", self.server.uri()) },
                    { "name": ASSET_NAME, "browser_download_url": download },
                ],
            })))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/download/{ASSET_NAME}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(package))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    fn launch_options(&self) -> Option<String> {
        self.manager
            .session()
            .launch_options(STARDEW_VALLEY_STEAM_APP_ID)
            .unwrap()
    }

    fn work_dir_is_empty(&self) -> bool {
        fs::read_dir(self.root.join("work"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

fn installer_package(with_installer: bool) -> Vec<u8> {
    let folder = "SMAPI 4.1.10 installer";
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(format!("{folder}/README.txt"), SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"read me").unwrap();
    if with_installer {
        let installer = std::iter::once(folder)
            .chain(INSTALLER_RELATIVE_PATH.iter().copied())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(installer, SimpleFileOptions::default().unix_permissions(0o755))
            .unwrap();
        zip.write_all(INSTALLER_SCRIPT.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<InstallEvent>) -> Vec<InstallEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn states(events: &[InstallEvent]) -> Vec<InstallState> {
    events
        .iter()
        .filter_map(|event| match event {
            InstallEvent::State(state) => Some(*state),
            InstallEvent::Progress(_) => None,
        })
        .collect()
}

fn assert_progress_is_ordered(events: &[InstallEvent]) {
    let mut last: Option<(&str, i64)> = None;
    let mut state_since_stage = false;
    for event in events {
        match event {
            InstallEvent::State(_) => state_since_stage = true,
            InstallEvent::Progress(progress) => {
                match last {
                    Some((stage, processed)) if stage == progress.stage_name => {
                        assert!(progress.processed_tasks_quantity > processed, "{events:?}");
                    }
                    _ => {
                        assert!(state_since_stage, "stage announced before its state: {events:?}");
                        assert_eq!(progress.processed_tasks_quantity, 0);
                    }
                }
                state_since_stage = false;
                last = Some((&progress.stage_name, progress.processed_tasks_quantity));
            }
        }
    }
}

#[tokio::test]
async fn test_install_latest_release() {
    let setup = Setup::new().await;
    setup.serve_release(installer_package(true)).await;
    assert!(!setup.manager.is_installed());
    assert_eq!(setup.launch_options().as_deref(), Some(""));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = setup
        .manager
        .install_latest(Some(tx), &never_cancelled())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        InstallOutcome::Installed {
            tag: "4.1.10".into()
        }
    );

    let events = drain(&mut rx);
    assert_eq!(
        states(&events),
        [
            InstallState::FetchingRelease,
            InstallState::Downloading,
            InstallState::Extracting,
            InstallState::Installing,
            InstallState::Verifying,
            InstallState::Done,
        ]
    );
    assert_progress_is_ordered(&events);
    let last_download = events
        .iter()
        .filter_map(|event| match event {
            InstallEvent::Progress(p) if p.stage_name.starts_with("Downloading") => Some(p),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(last_download.processed_tasks_quantity, 100);

    assert!(setup.root.join("Stardew Valley/StardewModdingAPI").is_file());
    assert!(setup.manager.is_installed());
    assert!(setup.manager.is_enabled());
    assert_eq!(setup.launch_options(), Some(setup.manager.launch_command()));
    assert!(setup.work_dir_is_empty());
}

#[tokio::test]
async fn test_missing_installer_fails_and_cleans_up() {
    let setup = Setup::new().await;
    setup.serve_release(installer_package(false)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let res = setup
        .manager
        .install_latest(Some(tx), &never_cancelled())
        .await;
    assert!(matches!(res, Err(SmapiError::InstallerNotFound(_))), "{res:?}");

    let events = drain(&mut rx);
    assert_eq!(states(&events).last(), Some(&InstallState::Failed));
    assert!(!states(&events).contains(&InstallState::Verifying));
    assert!(!setup.manager.is_installed());
    assert!(!setup.manager.is_enabled());
    assert_eq!(setup.launch_options().as_deref(), Some(""));
    assert!(setup.work_dir_is_empty());
}

#[tokio::test]
async fn test_no_release_is_nothing_to_do() {
    let setup = Setup::new().await;
    Mock::given(method("GET"))
        .and(path("/repos/Pathoschild/SMAPI/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&setup.server)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = setup
        .manager
        .install_latest(Some(tx), &never_cancelled())
        .await
        .unwrap();
    assert_eq!(outcome, InstallOutcome::NothingToDo);
    assert_eq!(
        states(&drain(&mut rx)),
        [InstallState::FetchingRelease, InstallState::Idle]
    );
}

#[tokio::test]
async fn test_release_lookup_failure_is_reported() {
    let setup = Setup::new().await;
    Mock::given(method("GET"))
        .and(path("/repos/Pathoschild/SMAPI/releases/latest"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&setup.server)
        .await;

    let res = setup.manager.install_latest(None, &never_cancelled()).await;
    assert!(matches!(res, Err(SmapiError::ReleaseLookup(_))), "{res:?}");
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let setup = Setup::new().await;

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    cancel_tx.send(true).unwrap();
    let res = setup.manager.install_latest(None, &cancel_rx).await;
    assert!(matches!(res, Err(SmapiError::Cancelled)), "{res:?}");
    assert!(setup.work_dir_is_empty());
}

#[test]
fn test_mod_pack_round_trip_between_games() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    for name in ["Automate", "ContentPatcher"] {
        let dir = source.join("Mods").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("manifest.json"), format!("{{\"Name\":\"{name}\"}}")).unwrap();
    }
    fs::create_dir_all(target.join("DisabledMods/Old")).unwrap();

    let pack = tmp.path().join("pack.zip");
    smm_rs::mods::export_mod_pack(&source, &pack).unwrap();
    smm_rs::mods::install_mod_pack(&target, &pack, &never_cancelled()).unwrap();

    let names = |game: &Path| {
        smm_rs::mods::list_mods(game)
            .unwrap()
            .into_iter()
            .map(|m| (m.name, m.is_enabled))
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&target), names(&source));
}
