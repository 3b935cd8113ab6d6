// Partitioned table writes and read-back
//
// Every write replaces whatever was at the table location: existing objects
// are removed first, then one Parquet file per partition is uploaded, and a
// `_SUCCESS` marker is written last. There is no append or merge mode, and a
// failed write leaves a location without the marker.

use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use arrow::datatypes::{Schema, SchemaRef};
use bytes::Bytes;
use opendal::{ErrorKind, Operator};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::sync::Arc;

use crate::encoding::{encode_parquet, writer_properties, DEFAULT_ROW_GROUP_SIZE};
use crate::error::{Result, WriterError};
use crate::partition::{data_schema, parse_partition_path, partition_column, split_partitions};

/// Name of the completion marker written after all part files
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// What one table write produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub location: String,
    pub rows: usize,
    /// Part files written, relative to the operator root, in write order
    pub files: Vec<String>,
}

/// Persists tables as Hive-partitioned Parquet under an output operator
#[derive(Debug, Clone)]
pub struct PartitionedWriter {
    operator: Operator,
    row_group_size: usize,
}

impl PartitionedWriter {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_row_group_size(mut self, row_group_size: usize) -> Self {
        self.row_group_size = row_group_size;
        self
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Overwrite `location` with `table`, partitioned by `partition_columns`.
    ///
    /// `name` is recorded in each file's key/value metadata.
    pub async fn write_table(
        &self,
        name: &str,
        table: &RecordBatch,
        location: &str,
        partition_columns: &[&str],
    ) -> Result<WriteSummary> {
        let location = location.trim_matches('/');
        self.remove_location(location).await?;

        let parts: Vec<(String, RecordBatch)> = if partition_columns.is_empty() {
            vec![(String::new(), table.clone())]
        } else {
            split_partitions(table, partition_columns)
                .map_err(|e| WriterError::write_failure(location, e))?
                .into_iter()
                .map(|p| (p.directory(), p.data))
                .collect()
        };

        let mut files = Vec::with_capacity(parts.len());
        for (directory, data) in parts {
            let encoded = encode_parquet(&data, writer_properties(self.row_group_size, name))
                .map_err(|e| WriterError::write_failure(location, e))?;
            let file_name = format!("part-00000-{}.parquet", encoded.short_hash());
            let path = if directory.is_empty() {
                format!("{}/{}", location, file_name)
            } else {
                format!("{}/{}/{}", location, directory, file_name)
            };

            self.operator
                .write(&path, encoded.bytes)
                .await
                .map_err(|e| WriterError::write_failure(path.as_str(), e))?;
            tracing::debug!(path = %path, rows = data.num_rows(), "Wrote part file");
            files.push(path);
        }

        let marker = format!("{}/{}", location, SUCCESS_MARKER);
        self.operator
            .write(&marker, Vec::<u8>::new())
            .await
            .map_err(|e| WriterError::write_failure(marker.as_str(), e))?;

        tracing::info!(
            table = name,
            location,
            rows = table.num_rows(),
            files = files.len(),
            "Wrote table"
        );

        Ok(WriteSummary {
            location: location.to_string(),
            rows: table.num_rows(),
            files,
        })
    }

    /// Delete every object under `location`.
    async fn remove_location(&self, location: &str) -> Result<()> {
        let dir = format!("{}/", location);
        match self.operator.remove_all(&dir).await {
            Ok(()) => {
                tracing::debug!(location, "Removed previous output");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WriterError::write_failure(location, e)),
        }
    }
}

/// Read a table written by [`PartitionedWriter::write_table`] back into one
/// batch with `schema`, rebuilding partition columns from the paths.
pub async fn read_table(
    operator: &Operator,
    location: &str,
    schema: SchemaRef,
) -> Result<RecordBatch> {
    let location = location.trim_matches('/');
    let dir = format!("{}/", location);
    let entries = operator
        .list_with(&dir)
        .recursive(true)
        .await
        .map_err(|e| WriterError::read_back(location, e))?;

    let mut paths: Vec<String> = entries
        .into_iter()
        .filter(|e| e.metadata().is_file() && e.path().ends_with(".parquet"))
        .map(|e| e.path().to_string())
        .collect();
    paths.sort();

    let mut batches = Vec::new();
    for path in &paths {
        let bytes: Bytes = operator
            .read(path)
            .await
            .map_err(|e| WriterError::read_back(path.as_str(), e))?
            .to_bytes();
        let relative = path.strip_prefix(dir.as_str()).unwrap_or(path.as_str());
        let values = parse_partition_path(relative);
        let partition_names: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
        let file_schema = Arc::new(data_schema(&schema, &partition_names));

        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .and_then(|b| b.build())
            .map_err(|e| WriterError::read_back(path.as_str(), e))?;
        for batch in reader {
            let batch = batch.map_err(|e| WriterError::read_back(path.as_str(), e))?;
            batches.push(restore_columns(path, &batch, &file_schema, &values, &schema)?);
        }
    }

    concat_batches(&schema, &batches).map_err(|e| WriterError::read_back(location, e))
}

fn restore_columns(
    path: &str,
    batch: &RecordBatch,
    file_schema: &Schema,
    values: &[(String, Option<String>)],
    schema: &SchemaRef,
) -> Result<RecordBatch> {
    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let column = match values.iter().find(|(c, _)| c == field.name()) {
            Some((_, value)) => partition_column(field, value.as_deref(), batch.num_rows())
                .map_err(|e| WriterError::read_back(path, e))?,
            None => {
                file_schema
                    .index_of(field.name())
                    .ok()
                    .and_then(|_| batch.column_by_name(field.name()))
                    .ok_or_else(|| {
                        WriterError::read_back(path, format!("missing column '{}'", field.name()))
                    })?
                    .clone()
            }
        };
        columns.push(column);
    }
    RecordBatch::try_new(schema.clone(), columns).map_err(|e| WriterError::read_back(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Int32Type};
    use opendal::services;

    fn memory() -> Operator {
        Operator::new(services::Memory::default()).unwrap().finish()
    }

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("year", DataType::Int32, true),
            Field::new("month", DataType::Int32, true),
        ]))
    }

    fn table(ids: Vec<&str>, years: Vec<Option<i32>>, months: Vec<Option<i32>>) -> RecordBatch {
        RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(Int32Array::from(years)),
                Arc::new(Int32Array::from(months)),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_partitioned_layout() {
        let writer = PartitionedWriter::new(memory());
        let input = table(
            vec!["a", "b", "c"],
            vec![Some(2018), Some(2018), None],
            vec![Some(11), Some(12), Some(1)],
        );

        let summary = writer
            .write_table("time", &input, "timetable.parquet", &["year", "month"])
            .await
            .unwrap();

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.files.len(), 3);
        assert!(summary.files[0].starts_with("timetable.parquet/year=2018/month=11/part-00000-"));
        assert!(summary.files[2]
            .starts_with("timetable.parquet/year=__HIVE_DEFAULT_PARTITION__/month=1/"));
        assert!(writer
            .operator()
            .exists("timetable.parquet/_SUCCESS")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_partition_round_trip() {
        let op = memory();
        let writer = PartitionedWriter::new(op.clone());
        let input = table(
            vec!["a", "b", "c", "d"],
            vec![Some(2018), Some(2017), None, Some(2018)],
            vec![Some(11), Some(12), Some(1), Some(11)],
        );
        writer
            .write_table("time", &input, "t", &["year", "month"])
            .await
            .unwrap();

        let back = read_table(&op, "t", schema()).await.unwrap();
        assert_eq!(back.num_rows(), 4);

        let mut rows: Vec<(String, Option<i32>, Option<i32>)> = (0..back.num_rows())
            .map(|i| {
                let year = back.column(1).as_primitive::<Int32Type>();
                let month = back.column(2).as_primitive::<Int32Type>();
                (
                    back.column(0).as_string::<i32>().value(i).to_string(),
                    year.is_valid(i).then(|| year.value(i)),
                    month.is_valid(i).then(|| month.value(i)),
                )
            })
            .collect();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                ("a".to_string(), Some(2018), Some(11)),
                ("b".to_string(), Some(2017), Some(12)),
                ("c".to_string(), None, Some(1)),
                ("d".to_string(), Some(2018), Some(11)),
            ]
        );
    }

    #[tokio::test]
    async fn test_overwrite_removes_previous_partitions() {
        let op = memory();
        let writer = PartitionedWriter::new(op.clone());

        let first = table(vec!["a"], vec![Some(2001)], vec![Some(1)]);
        writer.write_table("t", &first, "t", &["year"]).await.unwrap();

        let second = table(vec!["b"], vec![Some(2002)], vec![Some(2)]);
        let summary = writer.write_table("t", &second, "t", &["year"]).await.unwrap();
        assert_eq!(summary.files.len(), 1);

        let back = read_table(&op, "t", schema()).await.unwrap();
        assert_eq!(back.num_rows(), 1);
        assert_eq!(back.column(0).as_string::<i32>().value(0), "b");
    }

    #[tokio::test]
    async fn test_unpartitioned_empty_table_keeps_schema() {
        let op = memory();
        let writer = PartitionedWriter::new(op.clone());
        let empty = RecordBatch::new_empty(schema());

        let summary = writer.write_table("users", &empty, "users.parquet", &[]).await.unwrap();
        assert_eq!(summary.files.len(), 1);

        let back = read_table(&op, "users.parquet", schema()).await.unwrap();
        assert_eq!(back.num_rows(), 0);
        assert_eq!(back.schema(), schema());
    }

    #[tokio::test]
    async fn test_same_input_same_file_names() {
        let writer = PartitionedWriter::new(memory());
        let input = table(vec!["a", "b"], vec![Some(2018); 2], vec![Some(11); 2]);

        let first = writer.write_table("t", &input, "t", &["year"]).await.unwrap();
        let second = writer.write_table("t", &input, "t", &["year"]).await.unwrap();
        assert_eq!(first.files, second.files);
    }
}
