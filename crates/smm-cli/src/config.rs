use eyre::Context;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::{fs, path::Path};

pub const LAUNCHER_CONFIG_FILE: &str = "config.toml";

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde_as(as = "DisplayFromStr")]
    log_level: tracing::Level,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
        }
    }
}

impl LauncherConfig {
    #[inline]
    pub fn log_level(&self) -> tracing::Level {
        self.log_level
    }
}

pub fn load(config_dir: &Path) -> eyre::Result<LauncherConfig> {
    fs::create_dir_all(config_dir)
        .inspect_err(|e| eprintln!("failed to create config dir: {e}"))
        .context("failed to create the config directory")?;

    load_config_or_default(&config_dir.join(LAUNCHER_CONFIG_FILE))
        .with_context(|| format!("failed to load or create {LAUNCHER_CONFIG_FILE}"))
}

fn load_config_or_default<T: Default + Serialize + for<'de> Deserialize<'de>>(
    path: &Path,
) -> eyre::Result<T> {
    if !path.exists() {
        let config = T::default();
        let content = toml::to_string_pretty(&config).context("failed to serialize the config")?;
        fs::write(path, content)
            .inspect_err(|e| eprintln!("failed to write config file: {e}"))
            .context("failed to write the config file")?;
        return Ok(config);
    }

    let content = fs::read_to_string(path)
        .inspect_err(|e| eprintln!("failed to read config file: {e}"))
        .context("failed to read the config file")?;
    let config: T = toml::from_str(&content)
        .inspect_err(|e| eprintln!("failed to parse config file: {e}"))
        .context("failed to parse the config file")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load(tmp.path()).unwrap();
        assert_eq!(config.log_level(), tracing::Level::INFO);

        let written = fs::read_to_string(tmp.path().join(LAUNCHER_CONFIG_FILE)).unwrap();
        assert_eq!(written.trim(), "log_level = \"INFO\"");
    }

    #[test]
    fn test_custom_level() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(LAUNCHER_CONFIG_FILE), "log_level = \"debug\"\n").unwrap();
        assert_eq!(load(tmp.path()).unwrap().log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_malformed_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(LAUNCHER_CONFIG_FILE), "log_level = \"loud\"\n").unwrap();
        assert!(load(tmp.path()).is_err());
    }
}
