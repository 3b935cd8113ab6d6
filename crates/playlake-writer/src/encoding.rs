// Parquet encoding
//
// Serializes a table to Parquet bytes in memory and computes a Blake3
// content hash while encoding, so part-file names can be derived from the
// bytes without a second pass.

use arrow::array::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use std::io::{self, Write};

pub const DEFAULT_ROW_GROUP_SIZE: usize = 32 * 1024;

/// Metadata key naming the star table a file belongs to
pub const TABLE_METADATA_KEY: &str = "playlake.table";

struct HashingBuffer {
    buffer: Vec<u8>,
    hasher: blake3::Hasher,
}

impl HashingBuffer {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            hasher: blake3::Hasher::new(),
        }
    }

    fn finish(self) -> EncodedFile {
        EncodedFile {
            hash: self.hasher.finalize(),
            bytes: self.buffer,
        }
    }
}

impl Write for HashingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A fully encoded Parquet file
#[derive(Debug, Clone)]
pub struct EncodedFile {
    pub bytes: Vec<u8>,
    pub hash: blake3::Hash,
}

impl EncodedFile {
    /// First 16 hex characters of the content hash
    pub fn short_hash(&self) -> String {
        let full = hex::encode(self.hash.as_bytes());
        full[..16].to_string()
    }
}

/// Writer properties for one table
///
/// Configuration optimized for size and query performance:
/// - Snappy compression
/// - Dictionary encoding enabled
/// - Page-level statistics for predicate pushdown
/// - Producer and table name embedded in file metadata
pub fn writer_properties(row_group_size: usize, table: &str) -> WriterProperties {
    let row_group_size = if row_group_size == 0 {
        DEFAULT_ROW_GROUP_SIZE
    } else {
        row_group_size
    };

    let metadata = vec![
        KeyValue {
            key: "playlake.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
        KeyValue {
            key: TABLE_METADATA_KEY.to_string(),
            value: Some(table.to_string()),
        },
    ];

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(Compression::SNAPPY)
        .set_data_page_size_limit(256 * 1024)
        .set_write_batch_size(32 * 1024)
        .set_max_row_group_size(row_group_size)
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(metadata))
        .build()
}

/// Encode `batch` as a single Parquet file.
pub fn encode_parquet(
    batch: &RecordBatch,
    props: WriterProperties,
) -> parquet::errors::Result<EncodedFile> {
    let mut sink = HashingBuffer::new();
    {
        let mut writer = ArrowWriter::try_new(&mut sink, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
    }
    Ok(sink.finish())
}
