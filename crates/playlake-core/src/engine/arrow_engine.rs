// In-memory engine built on Arrow compute kernels
//
// Ordering and key equality go through the Arrow row format, which gives a
// byte-comparable encoding for any mix of column types. Sorting uses a
// stable sort over row indices.

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, RecordBatch, StringArray, UInt32Array};
use arrow::compute::{filter_record_batch, take, SortOptions};
use arrow::datatypes::{Field, Schema};
use arrow::error::ArrowError;
use arrow::row::{RowConverter, SortField};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{JoinOn, Predicate, Select, SortKey, TabularEngine};
use crate::error::{Result, TransformError};

/// Single-threaded engine operating on whole `RecordBatch` tables
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowEngine;

impl ArrowEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TabularEngine for ArrowEngine {
    fn project(&self, table: &RecordBatch, columns: &[Select<'_>]) -> Result<RecordBatch> {
        let schema = table.schema();
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        let mut seen = HashSet::with_capacity(columns.len());

        for select in columns {
            let idx = schema
                .index_of(select.source)
                .map_err(|_| TransformError::missing_column(select.source, &schema))?;
            if !seen.insert(select.alias) {
                return Err(TransformError::ColumnCollision {
                    column: select.alias.to_string(),
                });
            }
            fields.push(schema.field(idx).clone().with_name(select.alias));
            arrays.push(Arc::clone(table.column(idx)));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    fn filter(&self, table: &RecordBatch, predicate: &Predicate<'_>) -> Result<RecordBatch> {
        let mask: Vec<bool> = match predicate {
            Predicate::Equals { column, value } => string_column(table, column)?
                .iter()
                .map(|v| v == Some(*value))
                .collect(),
            Predicate::NotNull(column) => {
                let array = column_by_name(table, column)?;
                (0..array.len()).map(|i| array.is_valid(i)).collect()
            }
            Predicate::NotBlank(column) => string_column(table, column)?
                .iter()
                .map(|v| matches!(v, Some(s) if !s.trim().is_empty()))
                .collect(),
        };

        Ok(filter_record_batch(table, &BooleanArray::from(mask))?)
    }

    fn deduplicate(
        &self,
        table: &RecordBatch,
        key: &[&str],
        order: &[SortKey<'_>],
    ) -> Result<RecordBatch> {
        if table.num_rows() == 0 || table.num_columns() == 0 {
            return Ok(table.clone());
        }

        let mut ordering = Vec::with_capacity(order.len() + table.num_columns());
        for sort_key in order {
            ordering.push((
                Arc::clone(column_by_name(table, sort_key.column)?),
                SortOptions {
                    descending: sort_key.descending,
                    nulls_first: false,
                },
            ));
        }
        for column in table.columns() {
            ordering.push((
                Arc::clone(column),
                SortOptions {
                    descending: false,
                    nulls_first: false,
                },
            ));
        }
        let sorted = sorted_indices(&ordering, table.num_rows())?;

        let key_arrays = key
            .iter()
            .map(|name| column_by_name(table, name).map(Arc::clone))
            .collect::<Result<Vec<ArrayRef>>>()?;
        let key_converter = RowConverter::new(
            key_arrays
                .iter()
                .map(|a| SortField::new(a.data_type().clone()))
                .collect(),
        )?;
        let key_rows = key_converter.convert_columns(&key_arrays)?;

        let mut seen = HashSet::with_capacity(table.num_rows());
        let mut keep = Vec::with_capacity(table.num_rows());
        for idx in sorted {
            let row = idx as usize;
            if key_arrays.iter().any(|a| a.is_null(row)) {
                continue;
            }
            if seen.insert(key_rows.row(row)) {
                keep.push(idx);
            }
        }

        tracing::debug!(
            input_rows = table.num_rows(),
            output_rows = keep.len(),
            key = ?key,
            "deduplicated table"
        );

        take_rows(table, &UInt32Array::from(keep))
    }

    fn inner_join(
        &self,
        left: &RecordBatch,
        right: &RecordBatch,
        on: &JoinOn<'_>,
    ) -> Result<RecordBatch> {
        let left_keys = string_column(left, on.left)?;
        let right_keys = string_column(right, on.right)?;

        let mut index: HashMap<Cow<'_, str>, Vec<u32>> = HashMap::new();
        for (i, key) in right_keys.iter().enumerate() {
            if let Some(key) = key {
                index
                    .entry(on.matching.normalize(key))
                    .or_default()
                    .push(i as u32);
            }
        }

        let mut left_indices = Vec::with_capacity(left.num_rows());
        let mut right_indices = Vec::with_capacity(left.num_rows());
        let mut unmatched = 0usize;
        for (i, key) in left_keys.iter().enumerate() {
            let matches = key.and_then(|k| index.get(&*on.matching.normalize(k)));
            match matches {
                Some(rows) => {
                    for r in rows {
                        left_indices.push(i as u32);
                        right_indices.push(*r);
                    }
                }
                None => unmatched += 1,
            }
        }

        tracing::debug!(
            left_rows = left.num_rows(),
            output_rows = left_indices.len(),
            unmatched,
            left_key = on.left,
            right_key = on.right,
            "inner join"
        );

        let carried = self.project(right, on.carry)?;
        let left_schema = left.schema();
        for field in carried.schema().fields() {
            if left_schema.index_of(field.name()).is_ok() {
                return Err(TransformError::ColumnCollision {
                    column: field.name().to_string(),
                });
            }
        }

        let left_part = take_rows(left, &UInt32Array::from(left_indices))?;
        let right_part = take_rows(&carried, &UInt32Array::from(right_indices))?;

        let fields: Vec<Field> = left_part
            .schema()
            .fields()
            .iter()
            .chain(right_part.schema().fields().iter())
            .map(|f| f.as_ref().clone())
            .collect();
        let columns: Vec<ArrayRef> = left_part
            .columns()
            .iter()
            .chain(right_part.columns().iter())
            .cloned()
            .collect();

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

pub(crate) fn column_by_name<'a>(table: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    table
        .column_by_name(name)
        .ok_or_else(|| TransformError::missing_column(name, &table.schema()))
}

pub(crate) fn string_column<'a>(table: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let array = column_by_name(table, name)?;
    array
        .as_string_opt::<i32>()
        .ok_or_else(|| TransformError::unexpected_type(name, "Utf8", array.data_type()))
}

pub(crate) fn take_rows(table: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch> {
    let columns = table
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), indices, None))
        .collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok(RecordBatch::try_new(table.schema(), columns)?)
}

fn sorted_indices(columns: &[(ArrayRef, SortOptions)], len: usize) -> Result<Vec<u32>> {
    let converter = RowConverter::new(
        columns
            .iter()
            .map(|(a, opts)| SortField::new_with_options(a.data_type().clone(), *opts))
            .collect(),
    )?;
    let arrays: Vec<ArrayRef> = columns.iter().map(|(a, _)| Arc::clone(a)).collect();
    let rows = converter.convert_columns(&arrays)?;

    let mut indices: Vec<u32> = (0..len as u32).collect();
    indices.sort_by(|a, b| rows.row(*a as usize).cmp(&rows.row(*b as usize)));
    Ok(indices)
}
