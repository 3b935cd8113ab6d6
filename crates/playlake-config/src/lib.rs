// playlake-config - Layered runtime configuration
//
// Supports configuration from multiple sources:
// 1. CLI flags (highest priority, applied by the binary)
// 2. Environment variables (PLAYLAKE_* plus standard AWS_* credentials)
// 3. Config file path from PLAYLAKE_CONFIG env var
// 4. Config file contents from PLAYLAKE_CONFIG_CONTENT env var
// 5. Default config file locations (./playlake.toml, ./.playlake.toml)
// 6. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use playlake_core::{KeyMatch, TransformOptions, UserLevelPolicy};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub transform: TransformOptions,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Filesystem roots used when a side selects `fs` without a path
pub const DEFAULT_INPUT_PATH: &str = "./data/input";
pub const DEFAULT_OUTPUT_PATH: &str = "./data/output";

/// Where the raw JSON sources live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Glob for song catalog files, relative to the input root
    #[serde(default = "default_song_data")]
    pub song_data: String,

    /// Glob for listening log files, relative to the input root
    #[serde(default = "default_log_data")]
    pub log_data: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::fs(DEFAULT_INPUT_PATH),
            song_data: default_song_data(),
            log_data: default_log_data(),
        }
    }
}

fn default_song_data() -> String {
    "song_data/*/*/*/*.json".to_string()
}

fn default_log_data() -> String {
    "log_data/*/*/*.json".to_string()
}

/// Where the star-schema tables are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(flatten)]
    pub storage: StorageConfig,

    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::fs(DEFAULT_OUTPUT_PATH),
            row_group_size: default_row_group_size(),
        }
    }
}

fn default_row_group_size() -> usize {
    32 * 1024
}

/// Storage backend configuration shared by input and output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

impl StorageConfig {
    /// Filesystem storage rooted at `path`
    pub fn fs(path: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Fs,
            fs: Some(FsConfig { path: path.into() }),
            s3: None,
        }
    }

    /// Use `path` as the filesystem root if the backend is `fs` and no
    /// `[*.fs]` table was given.
    pub fn fill_fs_default(&mut self, path: &str) {
        if self.backend == StorageBackend::Fs && self.fs.is_none() {
            self.fs = Some(FsConfig {
                path: path.to_string(),
            });
        }
    }

    /// Human-readable location for logs, never includes credentials.
    pub fn describe(&self) -> String {
        match self.backend {
            StorageBackend::Fs => match &self.fs {
                Some(fs) => format!("fs:{}", fs.path),
                None => "fs:<unset>".to_string(),
            },
            StorageBackend::S3 => match &self.s3 {
                Some(s3) => format!(
                    "s3://{}/{}",
                    s3.bucket,
                    s3.prefix.as_deref().unwrap_or_default()
                ),
                None => "s3:<unset>".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Optional key prefix under the bucket (e.g., "sparkify/")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Load configuration with graceful fallback to defaults.
    /// Does not fail if a default config file is unreadable; the reason is
    /// returned alongside the config so the caller can log it once tracing
    /// is up.
    pub fn load_or_default() -> Result<(Self, Option<String>)> {
        sources::load_or_default()
    }

    /// Build a configuration from inline TOML plus overrides supplied by an
    /// `EnvSource`. Used by tests and embedders that do not want the host
    /// environment consulted.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (used for TOML layering).
    ///
    /// A section given without its `fs` table keeps the built-in
    /// filesystem root for that side.
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.input = other.input;
        self.output = other.output;
        self.transform = other.transform;
        self.logging = other.logging;

        self.input.storage.fill_fs_default(DEFAULT_INPUT_PATH);
        self.output.storage.fill_fs_default(DEFAULT_OUTPUT_PATH);
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
