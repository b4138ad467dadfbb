#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

#[macro_use]
extern crate tracing;

use std::sync::LazyLock;

pub mod archive;
pub mod config;
pub mod github;
pub mod mods;
pub mod progress;
pub mod smapi;
pub mod steam_support;
pub mod utils;
pub mod vdf;

pub use config::{ConfigError, ConfigService, ModManagerConfig, ModPackInfo};
pub use github::{GitHubClient, GitHubError};
pub use mods::{Mod, ModsError};
pub use progress::{InstallEvent, LoadingProgress};
pub use smapi::{InstallOutcome, InstallState, SmapiError, SmapiManager};
pub use steam_support::{LocalConfig, SteamSession, SteamSupportError, SteamUser};

/// The Steam App ID for Stardew Valley.
pub const STARDEW_VALLEY_STEAM_APP_ID: u32 = 413150;

pub static USER_AGENT: LazyLock<&str> = LazyLock::new(|| {
    let os_info = os_info::get();
    let os_ty = os_info.os_type();
    Box::leak(format!(
        "{pkg}/{ver} ({os} {os_ver}; {rustc}; {arch}; +{homepage}) reqwest/0.12",
        pkg = env!("CARGO_PKG_NAME"),
        ver = env!("CARGO_PKG_VERSION"),
        os = match os_ty {
            os_info::Type::Windows => "Windows NT".to_owned(),
            _ => os_ty.to_string(),
        },
        os_ver = os_info.version(),
        rustc = env!("RUSTC_VERSION").trim(),
        arch = std::env::consts::ARCH,
        homepage = env!("CARGO_PKG_HOMEPAGE"),
    ).into_boxed_str())
});

#[cfg(test)]
#[ctor::ctor]
fn setup_test() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")),
        )
        .with_file(true)
        .with_line_number(true)
        .init();
}
