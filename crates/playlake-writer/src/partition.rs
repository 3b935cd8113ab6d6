//! Hive-style partition layout
//!
//! A partitioned table is written as
//! `{location}/{col1}={v1}/{col2}={v2}/part-00000-{hash}.parquet`. Partition
//! columns live in the path only. Nulls are written as
//! `__HIVE_DEFAULT_PARTITION__`; every other value is percent-encoded with
//! `urlencoding`, so `/`, `=` and `%` never split or corrupt a segment.

use arrow::array::{Array, ArrayRef, RecordBatch, UInt32Array};
use arrow::compute::{cast, take, SortOptions};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::row::{OwnedRow, RowConverter, SortField};
use arrow::util::display::array_value_to_string;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Path value used for null partition values
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

const NULLS_LAST: SortOptions = SortOptions {
    descending: false,
    nulls_first: false,
};

/// One partition of a table: its path values and the non-partition columns
#[derive(Debug, Clone)]
pub struct Partition {
    /// `(column, value)` in partition column order; `None` for null
    pub values: Vec<(String, Option<String>)>,
    pub data: RecordBatch,
}

impl Partition {
    /// Relative directory, e.g. `year=2018/month=11`
    pub fn directory(&self) -> String {
        self.values
            .iter()
            .map(|(column, value)| {
                format!(
                    "{}={}",
                    escape_path_value(column),
                    value
                        .as_deref()
                        .map(escape_path_value)
                        .unwrap_or_else(|| DEFAULT_PARTITION.to_string())
                )
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Split `table` by the values of `columns`.
///
/// Partitions come back ordered by their typed values (nulls last); rows
/// inside a partition keep their input order.
pub fn split_partitions(
    table: &RecordBatch,
    columns: &[&str],
) -> Result<Vec<Partition>, arrow::error::ArrowError> {
    let schema = table.schema();
    let key_indices = columns
        .iter()
        .map(|c| schema.index_of(c))
        .collect::<Result<Vec<_>, _>>()?;
    let key_arrays: Vec<ArrayRef> = key_indices.iter().map(|&i| table.column(i).clone()).collect();

    let data_indices: Vec<usize> = (0..schema.fields().len())
        .filter(|i| !key_indices.contains(i))
        .collect();
    let data_schema = Arc::new(schema.project(&data_indices)?);

    let converter = RowConverter::new(
        key_arrays
            .iter()
            .map(|a| SortField::new_with_options(a.data_type().clone(), NULLS_LAST))
            .collect(),
    )?;
    let rows = converter.convert_columns(&key_arrays)?;

    let mut groups: BTreeMap<OwnedRow, Vec<u32>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups.entry(row.owned()).or_default().push(i as u32);
    }

    let mut partitions = Vec::with_capacity(groups.len());
    for indices in groups.into_values() {
        let first = indices[0] as usize;
        let values = columns
            .iter()
            .zip(&key_arrays)
            .map(|(column, array)| {
                let value = if array.is_null(first) {
                    None
                } else {
                    Some(array_value_to_string(array, first)?)
                };
                Ok((column.to_string(), value))
            })
            .collect::<Result<Vec<_>, arrow::error::ArrowError>>()?;

        let indices = UInt32Array::from(indices);
        let data_columns = data_indices
            .iter()
            .map(|&i| take(table.column(i).as_ref(), &indices, None))
            .collect::<Result<Vec<_>, _>>()?;
        let data = RecordBatch::try_new(data_schema.clone(), data_columns)?;

        partitions.push(Partition { values, data });
    }

    Ok(partitions)
}

/// Rebuild a partition column of `len` copies of `value` with `field`'s type.
pub fn partition_column(
    field: &Field,
    value: Option<&str>,
    len: usize,
) -> Result<ArrayRef, arrow::error::ArrowError> {
    let strings: ArrayRef = Arc::new(arrow::array::StringArray::from(vec![value; len]));
    if field.data_type() == &DataType::Utf8 {
        Ok(strings)
    } else {
        cast(&strings, field.data_type())
    }
}

/// Parse `col=value` segments of a relative file path, skipping the file name.
pub fn parse_partition_path(path: &str) -> Vec<(String, Option<String>)> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    segments
        .into_iter()
        .filter_map(|segment| {
            let (column, value) = segment.split_once('=')?;
            let value = if value == DEFAULT_PARTITION {
                None
            } else {
                Some(unescape_path_value(value))
            };
            Some((unescape_path_value(column), value))
        })
        .collect()
}

/// Percent-escape a column name or value for use as one path segment.
pub fn escape_path_value(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Inverse of [`escape_path_value`]. Segments that do not decode to UTF-8
/// are kept verbatim.
pub fn unescape_path_value(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Schema of the non-partition columns of `schema`.
pub fn data_schema(schema: &Schema, columns: &[&str]) -> Schema {
    Schema::new(
        schema
            .fields()
            .iter()
            .filter(|f| !columns.contains(&f.name().as_str()))
            .map(|f| f.as_ref().clone())
            .collect::<Vec<_>>(),
    )
}
