use crate::data::to_dataframe;
use crate::error::Error;
use calamine::{open_workbook_auto, Data, Range, Reader};
use datafusion::arrow::array::{ArrayRef, RecordBatch, StringBuilder};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::prelude::{DataFrame, SessionContext};
use log::info;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Sheets of the brand view workbook that carry period columns.
pub const REPORT_SHEETS: [&str; 4] = [
    "Category Sales Share",
    "GV and Conversion",
    "Share of Voice",
    "Subscribe & Save",
];

/// Storage category of a sheet, e.g. `Share of Voice` -> `share_of_voice`.
pub fn sheet_category(sheet: &str) -> String {
    sheet.replace(' ', "_").to_lowercase()
}

/// Loads one named sheet as a [`DataFrame`] of nullable text columns.
///
/// The first row is the header. Blank headers become `Unnamed: <index>` and repeated headers
/// get a `.1`, `.2`, ... suffix. Fully blank rows are dropped.
pub fn read_sheet(
    ctx: &SessionContext,
    workbook_path: &Path,
    sheet: &str,
) -> Result<DataFrame, Error> {
    let mut workbook = open_workbook_auto(workbook_path)?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(Error::MissingSheet {
            sheet: sheet.to_string(),
            workbook: workbook_path.display().to_string(),
        });
    }

    let range = workbook.worksheet_range(sheet)?;
    let batch = range_to_batch(&range).ok_or_else(|| Error::NoData {
        message: format!("sheet '{}' has no header row", sheet),
    })??;

    info!(
        "read {} row(s) x {} column(s) from sheet '{}'",
        batch.num_rows(),
        batch.num_columns(),
        sheet
    );
    to_dataframe(ctx, batch.schema(), vec![batch])
}

/// `None` when the range has no rows at all.
fn range_to_batch(range: &Range<Data>) -> Option<Result<RecordBatch, Error>> {
    let mut rows = range.rows();
    let header = rows.next()?;
    let names = header_names(header);

    let mut builders: Vec<StringBuilder> = names.iter().map(|_| StringBuilder::new()).collect();
    for row in rows {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        for (i, builder) in builders.iter_mut().enumerate() {
            builder.append_option(row.get(i).and_then(cell_text));
        }
    }

    let schema = Arc::new(Schema::new(
        names
            .into_iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let columns: Vec<ArrayRef> = builders
        .iter_mut()
        .map(|builder| Arc::new(builder.finish()) as ArrayRef)
        .collect();

    Some(RecordBatch::try_new(schema, columns).map_err(Error::from))
}

fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = cell_text(cell)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| format!("Unnamed: {}", i));
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                format!("{}.{}", name, *count - 1)
            }
        })
        .collect()
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        // Whole numbers are stored as floats by Excel.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(datetime) => datetime.to_string(),
            None => cell.to_string(),
        }),
        other => Some(other.to_string()),
    }
}
