// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::env_overrides::ENV_PREFIX;
use crate::*;
use anyhow::{anyhow, bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_storage_config(&config.input.storage, "input")?;
    validate_storage_config(&config.output.storage, "output")?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_input_config(config: &InputConfig) -> Result<()> {
    if config.song_data.trim().is_empty() {
        bail!(
            "Song catalog glob is required\n\n\
            How to fix:\n\
              • Environment: export {}SONG_DATA='song_data/*/*/*/*.json'\n\
              • TOML: [input]\n              song_data = \"song_data/*/*/*/*.json\"",
            ENV_PREFIX
        );
    }

    if config.log_data.trim().is_empty() {
        bail!(
            "Listening log glob is required\n\n\
            How to fix:\n\
              • Environment: export {}LOG_DATA='log_data/*/*/*.json'\n\
              • TOML: [input]\n              log_data = \"log_data/*/*/*.json\"",
            ENV_PREFIX
        );
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<()> {
    if config.row_group_size == 0 {
        bail!(
            "output.row_group_size must be greater than 0\n\n\
            How to fix:\n\
              • Environment: export {}ROW_GROUP_SIZE=32768\n\
              • TOML: [output]\n              row_group_size = 32768",
            ENV_PREFIX
        );
    }

    if config.row_group_size > 10_000_000 {
        warn!(
            row_group_size = config.row_group_size,
            "output.row_group_size is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig, side: &str) -> Result<()> {
    let env_side = side.to_uppercase();
    match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                anyhow!(
                    "fs {side} backend requires '{side}.fs' configuration\n\n\
                    How to fix:\n\
                      • Environment: export {prefix}{env_side}_PATH=./data/{side}\n\
                      • TOML: [{side}.fs]\n              path = \"./data/{side}\"",
                    side = side,
                    prefix = ENV_PREFIX,
                    env_side = env_side,
                )
            })?;

            if fs.path.is_empty() {
                bail!(
                    "Filesystem path for {side} is required\n\n\
                    How to fix:\n\
                      • Environment: export {prefix}{env_side}_PATH=./data/{side}\n\
                      • TOML: [{side}.fs]\n              path = \"./data/{side}\"",
                    side = side,
                    prefix = ENV_PREFIX,
                    env_side = env_side,
                );
            }
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                anyhow!(
                    "s3 {side} backend requires '{side}.s3' configuration\n\n\
                    How to fix:\n\
                      • Environment: export {prefix}{env_side}_S3_BUCKET=my-bucket\n\
                      • TOML: [{side}.s3]\n              bucket = \"my-bucket\"",
                    side = side,
                    prefix = ENV_PREFIX,
                    env_side = env_side,
                )
            })?;

            if s3.bucket.is_empty() {
                bail!(
                    "S3 bucket name for {side} is required\n\n\
                    How to fix:\n\
                      • Environment: export {prefix}{env_side}_S3_BUCKET=my-bucket\n\
                      • TOML: [{side}.s3]\n              bucket = \"my-bucket\"",
                    side = side,
                    prefix = ENV_PREFIX,
                    env_side = env_side,
                );
            }

            if s3.region.is_empty() {
                bail!(
                    "S3 region for {side} is required\n\n\
                    How to fix:\n\
                      • Environment: export {prefix}{env_side}_S3_REGION=us-west-2 (or AWS_REGION)\n\
                      • TOML: [{side}.s3]\n              region = \"us-west-2\"",
                    side = side,
                    prefix = ENV_PREFIX,
                    env_side = env_side,
                );
            }

            if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
                warn!(
                    side,
                    "only one of access_key_id / secret_access_key is set; \
                     the S3 client will fall back to its default credential chain"
                );
            }
        }
    }

    Ok(())
}

fn validate_logging_config(config: &LogConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!(
            "logging.level must not be empty\n\n\
            How to fix:\n\
              • Environment: export {}LOG_LEVEL=info\n\
              • TOML: [logging]\n              level = \"info\"",
            ENV_PREFIX
        );
    }
    Ok(())
}
