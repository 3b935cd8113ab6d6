use super::{FsConfig, LogFormat, RuntimeConfig, S3Config, StorageBackend, StorageConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "PLAYLAKE_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the PLAYLAKE_ prefix
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    apply_storage_overrides(&mut config.input.storage, env, "INPUT_")?;
    apply_storage_overrides(&mut config.output.storage, env, "OUTPUT_")?;

    // Source globs
    if let Some(glob) = get_env_string(env, "SONG_DATA")? {
        config.input.song_data = glob;
    }
    if let Some(glob) = get_env_string(env, "LOG_DATA")? {
        config.input.log_data = glob;
    }

    // Output encoding
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.output.row_group_size = val;
    }

    // Transformation knobs
    if let Some(mode) = get_env_string(env, "TITLE_MATCH")? {
        config.transform.title_match = mode
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("Invalid PLAYLAKE_TITLE_MATCH value")?;
    }
    if let Some(policy) = get_env_string(env, "USER_LEVEL")? {
        config.transform.user_level = policy
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("Invalid PLAYLAKE_USER_LEVEL value")?;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // AWS standard variables (without PLAYLAKE_ prefix for compatibility).
    // They only fill S3 sections that exist and leave explicit values alone.
    let access_key_id = get_raw_env_string(env, "AWS_ACCESS_KEY_ID")?;
    let secret_access_key = get_raw_env_string(env, "AWS_SECRET_ACCESS_KEY")?;
    let region = get_raw_env_string(env, "AWS_REGION")?;
    for storage in [&mut config.input.storage, &mut config.output.storage] {
        if let Some(s3) = storage.s3.as_mut() {
            if s3.access_key_id.is_none() {
                s3.access_key_id = access_key_id.clone();
            }
            if s3.secret_access_key.is_none() {
                s3.secret_access_key = secret_access_key.clone();
            }
            if s3.region.is_empty() {
                if let Some(region) = &region {
                    s3.region = region.clone();
                }
            }
        }
    }

    Ok(())
}

fn apply_storage_overrides<E: EnvSource>(
    storage: &mut StorageConfig,
    env: &E,
    side: &str,
) -> Result<()> {
    let key = |suffix: &str| format!("{}{}", side, suffix);

    if let Some(backend) = get_env_string(env, &key("BACKEND"))? {
        storage.backend = backend
            .parse::<StorageBackend>()
            .with_context(|| format!("Invalid {}{} value", ENV_PREFIX, key("BACKEND")))?;
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, &key("PATH"))? {
        storage.fs = Some(FsConfig { path });
    }

    // S3 storage
    if let Some(bucket) = get_env_string(env, &key("S3_BUCKET"))? {
        ensure_s3(storage).bucket = bucket;
    }
    if let Some(region) = get_env_string(env, &key("S3_REGION"))? {
        ensure_s3(storage).region = region;
    }
    if let Some(endpoint) = get_env_string(env, &key("S3_ENDPOINT"))? {
        ensure_s3(storage).endpoint = Some(endpoint);
    }
    if let Some(prefix) = get_env_string(env, &key("S3_PREFIX"))? {
        ensure_s3(storage).prefix = normalize_prefix(prefix);
    }

    Ok(())
}

fn ensure_s3(storage: &mut StorageConfig) -> &mut S3Config {
    storage.s3.get_or_insert_with(S3Config::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the PLAYLAKE_ prefix
/// Used for AWS standard variables like AWS_ACCESS_KEY_ID
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

pub(crate) fn normalize_prefix(prefix: String) -> Option<String> {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() {
        None
    } else if trimmed.ends_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("{}/", trimmed))
    }
}
