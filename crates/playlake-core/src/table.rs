// Small helpers for shaping finished tables
//
// Operators produce whatever field nullability their inputs carried. Before a
// table leaves the core it is conformed to the declared star schema, which
// both fixes column order and enforces non-null keys.

use arrow::array::{ArrayRef, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{Field, Schema, SchemaRef};
use std::sync::Arc;

use crate::engine::arrow_engine::column_by_name;
use crate::error::{Result, TransformError};

/// Rebuild `table` with exactly the fields of `schema`, casting where the
/// physical type differs. Fails if a column is missing or a non-nullable
/// field holds nulls.
pub fn conform(table: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let column = column_by_name(table, field.name())?;
        let column = if column.data_type() == field.data_type() {
            Arc::clone(column)
        } else {
            cast(column, field.data_type())?
        };
        columns.push(column);
    }
    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

/// Append columns to the right of `table`.
pub fn append_columns(table: &RecordBatch, extra: Vec<(Field, ArrayRef)>) -> Result<RecordBatch> {
    let schema = table.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = table.columns().to_vec();

    for (field, column) in extra {
        if schema.index_of(field.name()).is_ok() {
            return Err(TransformError::ColumnCollision {
                column: field.name().to_string(),
            });
        }
        fields.push(field);
        columns.push(column);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Prepend a column to the left of `table`.
pub fn prepend_column(table: &RecordBatch, field: Field, column: ArrayRef) -> Result<RecordBatch> {
    let schema = table.schema();
    if schema.index_of(field.name()).is_ok() {
        return Err(TransformError::ColumnCollision {
            column: field.name().to_string(),
        });
    }

    let mut fields = Vec::with_capacity(schema.fields().len() + 1);
    fields.push(field);
    fields.extend(schema.fields().iter().map(|f| f.as_ref().clone()));

    let mut columns = Vec::with_capacity(fields.len());
    columns.push(column);
    columns.extend(table.columns().iter().cloned());

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
