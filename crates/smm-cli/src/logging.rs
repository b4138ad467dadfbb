use crate::config::LauncherConfig;
use aho_corasick::{AhoCorasick, AhoCorasickKind, Anchored, Input, StartKind};
use directories::ProjectDirs;
use eyre::Context;
use std::fs;
use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, Rotation},
};
use tracing_subscriber::{
    filter::filter_fn, fmt, fmt::writer::MakeWriterExt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// HTTP and TLS internals that are only interesting when debugging.
const NOISE_TARGETS: &[&str] = &["hyper", "reqwest", "rustls", "h2", "tower", "mio", "want"];

#[derive(Default)]
pub(crate) struct LoggingGuard {
    _file_appender_guard: Option<WorkerGuard>,
    _stderr_appender_guard: Option<WorkerGuard>,
}

pub fn init(dirs: &ProjectDirs, config: &LauncherConfig) -> LoggingGuard {
    init_inner(dirs, config).unwrap_or_else(|e| {
        eprintln!("failed to initialize logging, continuing without log files: {e}");
        LoggingGuard::default()
    })
}

fn init_inner(dirs: &ProjectDirs, config: &LauncherConfig) -> eyre::Result<LoggingGuard> {
    let log_dir = dirs.data_dir().join("logs");
    fs::create_dir_all(&log_dir)
        .inspect_err(|e| eprintln!("failed to create log directory: {e}"))
        .context("failed to create the log directory")?;

    let file_appender = rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("smm")
        .filename_suffix("log")
        .build(&log_dir)
        .inspect_err(|e| eprintln!("failed to create file appender: {e}"))
        .context("failed to create the log file appender")?;

    let (non_blocking_file_appender, file_appender_guard) =
        tracing_appender::non_blocking(file_appender);
    let (non_blocking_stderr_appender, stderr_appender_guard) =
        tracing_appender::non_blocking(std::io::stderr());

    let noise_targets = noise_matcher()?;
    let noise_filter =
        filter_fn(move |metadata| !is_noise(&noise_targets, metadata.target(), metadata.level()));

    tracing_subscriber::registry()
        .with(noise_filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(non_blocking_file_appender.with_max_level(config.log_level())),
        )
        .with(
            fmt::Layer::new()
                .with_writer(non_blocking_stderr_appender.with_max_level(config.log_level())),
        )
        .try_init()
        .context("a global logger is already installed")?;

    Ok(LoggingGuard {
        _file_appender_guard: Some(file_appender_guard),
        _stderr_appender_guard: Some(stderr_appender_guard),
    })
}

fn noise_matcher() -> eyre::Result<AhoCorasick> {
    Ok(AhoCorasick::builder()
        .kind(Some(AhoCorasickKind::DFA))
        .start_kind(StartKind::Anchored)
        .build(NOISE_TARGETS)?)
}

/// INFO and below from a noisy target prefix.
fn is_noise(matcher: &AhoCorasick, target: &str, level: &Level) -> bool {
    let input = Input::new(target).anchored(Anchored::Yes);
    matcher.find(input).is_some() && level >= &Level::INFO
}
