use crate::error::Error;
use datafusion::arrow::array::{Array, ArrayRef, RecordBatch, StringArray, StringBuilder};
use datafusion::arrow::compute::{cast_with_options, CastOptions};
use datafusion::arrow::csv::WriterBuilder;
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::datasource::MemTable;
use datafusion::prelude::{CsvReadOptions, DataFrame, SessionConfig, SessionContext};
use log::debug;
use std::path::Path;
use std::sync::Arc;

/// Separator between the period identifier and the period value, e.g. `Week: 2024-06-02`.
pub const PERIOD_SEPARATOR: &str = ": ";
pub const PERIOD_IDENTIFIER: &str = "Period Identifier";
pub const PERIOD_VALUE: &str = "Period Value";
pub const VALUE: &str = "Value";
/// Name of the composite column in reports that already have one row per period.
pub const PERIOD_COLUMN: &str = "period";

/// Only the header row is needed to name the columns; every column is read as text.
const HEADER_INFER_RECORDS: usize = 1;

/// Session used for all report reshaping.
///
/// A single partition keeps scans and writes in file order.
pub fn session_context() -> SessionContext {
    SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1))
}

/// Splits a composite period label on the first `": "`.
///
/// # Returns
/// `(period identifier, period value)`, or [`Error::MalformedPeriod`] when the separator is
/// missing.
pub fn split_period(label: &str) -> Result<(&str, &str), Error> {
    label
        .split_once(PERIOD_SEPARATOR)
        .ok_or_else(|| Error::MalformedPeriod {
            value: label.to_string(),
        })
}

///
/// Unpivots a wide table into long form.
///
/// The first `identifier_columns` columns are kept on every output row. Each remaining
/// column becomes one output row per input row, carrying the cell as `Value` (text) and the
/// column header split into `Period Identifier` and `Period Value`.
///
/// # Arguments
/// * `schema` - Schema of the wide table
/// * `batches` - Rows of the wide table
/// * `identifier_columns` - Number of leading identifier columns
///
/// # Returns
/// The long-form schema and batches, ordered metric column first, then input row.
pub fn melt_batches(
    schema: &SchemaRef,
    batches: &[RecordBatch],
    identifier_columns: usize,
) -> Result<(SchemaRef, Vec<RecordBatch>), Error> {
    let fields = schema.fields();
    if identifier_columns > fields.len() {
        return Err(Error::IdentifierColumnsOutOfRange {
            requested: identifier_columns,
            available: fields.len(),
        });
    }

    // Every header is validated before any row is produced.
    let periods = fields[identifier_columns..]
        .iter()
        .enumerate()
        .map(|(offset, field)| {
            split_period(field.name()).map(|(identifier, value)| {
                (identifier_columns + offset, identifier, value)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut long_fields: Vec<Field> = fields[..identifier_columns]
        .iter()
        .map(|field| field.as_ref().clone())
        .collect();
    long_fields.push(Field::new(VALUE, DataType::Utf8, true));
    long_fields.push(Field::new(PERIOD_IDENTIFIER, DataType::Utf8, false));
    long_fields.push(Field::new(PERIOD_VALUE, DataType::Utf8, false));
    let long_schema = Arc::new(Schema::new(long_fields));

    let mut melted = Vec::with_capacity(periods.len() * batches.len());
    for (index, identifier, value) in &periods {
        for batch in batches {
            let rows = batch.num_rows();
            let mut columns: Vec<ArrayRef> = batch.columns()[..identifier_columns].to_vec();
            columns.push(to_utf8(batch.column(*index))?);
            columns.push(Arc::new(StringArray::from(vec![*identifier; rows])));
            columns.push(Arc::new(StringArray::from(vec![*value; rows])));
            melted.push(RecordBatch::try_new(long_schema.clone(), columns)?);
        }
    }

    debug!(
        "melted {} metric column(s) over {} identifier column(s)",
        periods.len(),
        identifier_columns
    );
    Ok((long_schema, melted))
}

///
/// Replaces a composite period column with `Period Identifier` and `Period Value`.
///
/// All other columns keep their position; the two new columns are appended.
///
/// # Returns
/// The new schema and batches, or [`Error::MalformedPeriod`] for a null or separator-free
/// value.
pub fn split_period_batches(
    schema: &SchemaRef,
    batches: &[RecordBatch],
    column: &str,
) -> Result<(SchemaRef, Vec<RecordBatch>), Error> {
    let index = schema
        .index_of(column)
        .map_err(|_| Error::MissingColumn {
            column: column.to_string(),
        })?;

    let mut split_fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, field)| field.as_ref().clone())
        .collect();
    split_fields.push(Field::new(PERIOD_IDENTIFIER, DataType::Utf8, false));
    split_fields.push(Field::new(PERIOD_VALUE, DataType::Utf8, false));
    let split_schema = Arc::new(Schema::new(split_fields));

    let mut split = Vec::with_capacity(batches.len());
    for batch in batches {
        let labels = to_utf8(batch.column(index))?;
        let labels = labels
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| Error::MissingColumn {
                column: column.to_string(),
            })?;

        let mut identifiers = StringBuilder::with_capacity(labels.len(), labels.len() * 8);
        let mut values = StringBuilder::with_capacity(labels.len(), labels.len() * 10);
        for i in 0..labels.len() {
            if labels.is_null(i) {
                return Err(Error::MalformedPeriod {
                    value: String::new(),
                });
            }
            let (identifier, value) = split_period(labels.value(i))?;
            identifiers.append_value(identifier);
            values.append_value(value);
        }

        let mut columns: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, array)| array.clone())
            .collect();
        columns.push(Arc::new(identifiers.finish()));
        columns.push(Arc::new(values.finish()));
        split.push(RecordBatch::try_new(split_schema.clone(), columns)?);
    }

    Ok((split_schema, split))
}

/// Melts a wide [`DataFrame`], see [`melt_batches`].
pub async fn melt(
    ctx: &SessionContext,
    df: DataFrame,
    identifier_columns: usize,
) -> Result<DataFrame, Error> {
    let schema = df.schema().inner().clone();
    let batches = df.collect().await?;
    let (schema, melted) = melt_batches(&schema, &batches, identifier_columns)?;
    to_dataframe(ctx, schema, melted)
}

/// Splits a composite period column of a [`DataFrame`], see [`split_period_batches`].
pub async fn split_period_column(
    ctx: &SessionContext,
    df: DataFrame,
    column: &str,
) -> Result<DataFrame, Error> {
    let schema = df.schema().inner().clone();
    let batches = df.collect().await?;
    let (schema, split) = split_period_batches(&schema, &batches, column)?;
    to_dataframe(ctx, schema, split)
}

/// Wraps in-memory batches as a [`DataFrame`]; the schema is kept even without rows.
pub fn to_dataframe(
    ctx: &SessionContext,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
) -> Result<DataFrame, Error> {
    let table = MemTable::try_new(schema, vec![batches])?;
    Ok(ctx.read_table(Arc::new(table))?)
}

/// Reads a CSV file with a header row, keeping every cell as nullable text.
///
/// Leading zeros and trailing decimal zeros survive, and a late non-numeric cell cannot fail
/// the read.
pub async fn read_csv(ctx: &SessionContext, path: &Path) -> Result<DataFrame, Error> {
    let path = path.to_string_lossy().to_string();
    let header = ctx
        .read_csv(
            path.clone(),
            CsvReadOptions::new().schema_infer_max_records(HEADER_INFER_RECORDS),
        )
        .await?;

    let text_schema = Schema::new(
        header
            .schema()
            .fields()
            .iter()
            .map(|field| Field::new(field.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );
    Ok(ctx
        .read_csv(path, CsvReadOptions::new().schema(&text_schema))
        .await?)
}

/// Writes the frame to a single CSV file. The header row is written even without data rows.
pub async fn write_csv(df: DataFrame, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let schema = df.schema().inner().clone();
    let mut batches = df.collect().await?;
    if batches.is_empty() {
        batches.push(RecordBatch::new_empty(schema));
    }

    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(std::fs::File::create(path)?);
    for batch in &batches {
        writer.write(batch)?;
    }

    debug!("wrote {}", path.display());
    Ok(())
}

fn to_utf8(array: &ArrayRef) -> Result<ArrayRef, Error> {
    if array.data_type() == &DataType::Utf8 {
        return Ok(array.clone());
    }
    Ok(cast_with_options(
        array.as_ref(),
        &DataType::Utf8,
        &CastOptions::default(),
    )?)
}
