// Configuration source loading
//
// Priority order:
// 1. Environment variables (PLAYLAKE_* prefix, AWS_* credentials)
// 2. Config file path from PLAYLAKE_CONFIG
// 3. Inline config content from PLAYLAKE_CONFIG_CONTENT
// 4. Default config files (./playlake.toml, ./.playlake.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::*;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["./playlake.toml", "./.playlake.toml"];

/// Load configuration using the host environment and filesystem.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    if let Some(file_config) = load_from_file()? {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return read_config_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var(format!("{}CONFIG_CONTENT", ENV_PREFIX)) {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from PLAYLAKE_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path);
        if path.exists() {
            return read_config_file(path).map(Some);
        }
    }

    Ok(None)
}

fn read_config_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
/// Environment overrides still apply on top of the file.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let file_config = read_config_file(path.as_ref())?;

    let mut config = RuntimeConfig::default();
    config.merge(file_config);

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration with graceful fallback to defaults.
/// Tries standard config file locations, returns defaults if none load,
/// together with the reason the file was skipped.
pub fn load_or_default() -> Result<(RuntimeConfig, Option<String>)> {
    layer_over_defaults(load_from_file(), &StdEnvSource)
}

fn layer_over_defaults<E: EnvSource>(
    file: Result<Option<RuntimeConfig>>,
    env: &E,
) -> Result<(RuntimeConfig, Option<String>)> {
    let mut config = RuntimeConfig::default();

    let skipped = match file {
        Ok(Some(file_config)) => {
            config.merge(file_config);
            None
        }
        Ok(None) => None,
        Err(e) => Some(format!("{:#}", e)),
    };

    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok((config, skipped))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_explicit_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[output]\nrow_group_size = 512\n\n[output.fs]\npath = \"/tmp/playlake-out\""
        )
        .unwrap();

        let config = read_config_file(file.path()).unwrap();
        assert_eq!(config.output.row_group_size, 512);
        assert_eq!(config.output.storage.describe(), "fs:/tmp/playlake-out");
    }

    #[test]
    fn unreadable_default_file_is_reported_not_fatal() {
        let file = read_config_file(Path::new("/nonexistent/playlake.toml")).map(Some);
        let (config, skipped) =
            layer_over_defaults(file, &crate::tests::MapEnv::new(&[])).unwrap();

        assert_eq!(config.output.storage.describe(), "fs:./data/output");
        assert!(skipped.unwrap().contains("/nonexistent/playlake.toml"));
    }

    #[test]
    fn readable_file_is_layered_without_warning() {
        let file: Result<Option<RuntimeConfig>> =
            toml::from_str("[logging]\nlevel = \"debug\"").map(Some).map_err(Into::into);
        let (config, skipped) =
            layer_over_defaults(file, &crate::tests::MapEnv::new(&[])).unwrap();

        assert!(skipped.is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_config_file_names_the_path() {
        let err = read_config_file(Path::new("/nonexistent/playlake.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/playlake.toml"));
    }
}
