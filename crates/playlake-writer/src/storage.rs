//! Storage operator construction
//!
//! Operators are plain values handed to the loader and the writer; nothing
//! here is cached process-wide, so input and output may use different
//! backends within one run.

use opendal::{services, Operator};
use playlake_config::{StorageBackend, StorageConfig};

use crate::error::{Result, WriterError};

/// Build an OpenDAL operator rooted at the configured location.
pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
    let operator = match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                WriterError::invalid_config("fs config required for filesystem backend")
            })?;

            let fs_builder = services::Fs::default().root(&fs.path);
            Operator::new(fs_builder)
                .map_err(|e| {
                    WriterError::invalid_config(format!(
                        "Failed to create filesystem operator: {}",
                        e
                    ))
                })?
                .finish()
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                WriterError::invalid_config("s3 config required for S3 backend")
            })?;

            let mut s3_builder = services::S3::default()
                .bucket(&s3.bucket)
                .region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                s3_builder = s3_builder.endpoint(endpoint);
            }
            if let Some(prefix) = &s3.prefix {
                s3_builder = s3_builder.root(&format!("/{}", prefix));
            }
            if let (Some(key), Some(secret)) = (&s3.access_key_id, &s3.secret_access_key) {
                s3_builder = s3_builder.access_key_id(key).secret_access_key(secret);
            }

            Operator::new(s3_builder)
                .map_err(|e| {
                    WriterError::invalid_config(format!("Failed to create S3 operator: {}", e))
                })?
                .finish()
        }
    };

    tracing::debug!(location = %config.describe(), "Storage operator initialized");
    Ok(operator)
}
