// Raw JSON source loading
//
// Lists the files matching a glob under the input operator, reads them in
// lexicographic path order and decodes them with the Arrow JSON reader
// against a fixed schema. Each file may hold one object or many
// newline-delimited objects; missing fields become nulls and unknown fields
// are ignored.

use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::json::ReaderBuilder;
use opendal::{ErrorKind, Operator};

use crate::error::{Result, WriterError};
use crate::glob::GlobPattern;

/// Loads raw JSON tables from an input operator
#[derive(Debug, Clone)]
pub struct RawLoader {
    operator: Operator,
}

impl RawLoader {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// Paths under the operator root matching `pattern`, sorted.
    pub async fn list_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let glob = GlobPattern::new(pattern);
        let prefix = glob.literal_prefix();

        let entries = match self.operator.list_with(&prefix).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(WriterError::source_read(glob.as_str(), e)),
        };

        let mut paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file())
            .map(|entry| entry.path().to_string())
            .filter(|path| glob.matches(path))
            .collect();
        paths.sort();

        tracing::debug!(pattern = glob.as_str(), files = paths.len(), "Listed source files");
        Ok(paths)
    }

    /// Load every file matching `pattern` into one table with `schema`.
    ///
    /// Fails when nothing matches or any file is not valid JSON for the
    /// schema.
    pub async fn load(&self, pattern: &str, schema: SchemaRef) -> Result<RecordBatch> {
        let paths = self.list_matching(pattern).await?;
        if paths.is_empty() {
            return Err(WriterError::source_read(pattern, "no files match"));
        }

        let mut batches = Vec::new();
        for path in &paths {
            let bytes = self
                .operator
                .read(path)
                .await
                .map_err(|e| WriterError::source_read(path.as_str(), e))?
                .to_bytes();
            batches.extend(decode_json(path, &bytes, &schema)?);
        }

        let table = concat_batches(&schema, &batches)
            .map_err(|e| WriterError::source_read(pattern, e))?;

        tracing::info!(
            pattern,
            files = paths.len(),
            rows = table.num_rows(),
            "Loaded source"
        );
        Ok(table)
    }
}

/// Decode one JSON (or JSON lines) document.
pub fn decode_json(location: &str, bytes: &[u8], schema: &SchemaRef) -> Result<Vec<RecordBatch>> {
    let reader = ReaderBuilder::new(schema.clone())
        .with_coerce_primitive(true)
        .build(bytes)
        .map_err(|e| WriterError::source_read(location, e))?;

    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| WriterError::source_read(location, e))
}
