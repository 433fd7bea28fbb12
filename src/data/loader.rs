use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray,
};
use arrow::datatypes::DataType;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Catalog, Column, RawRecord, RawValue};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a fit catalog from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – comma-separated, header row with the required columns
/// * `.json`    – `[{ "Name": ..., "logN_HI": ..., "Ion": ..., ... }, ...]`
/// * `.parquet` – one column per required field
/// * anything else (`.txt`, `.dat`) – whitespace-separated ASCII table
///
/// Rows that fail validation are skipped with a warning. A catalog that
/// yields no usable rows at all is an error.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        _ => load_ascii(path),
    }
    .with_context(|| format!("loading catalog {}", path.display()))?;

    let catalog = Catalog::from_records(records);
    if catalog.is_empty() {
        bail!(
            "catalog {} has no usable rows ({} skipped)",
            path.display(),
            catalog.skipped.len()
        );
    }
    info!(
        "read {} catalog rows from {} ({} skipped)",
        catalog.len(),
        path.display(),
        catalog.skipped.len()
    );
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// Header lookup
// ---------------------------------------------------------------------------

/// Position of each required column in a header row.
#[derive(Debug, Clone, PartialEq)]
struct ColumnIndex {
    positions: [usize; 6],
}

impl ColumnIndex {
    fn from_headers<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let mut positions = [0usize; 6];
        for (slot, column) in Column::ALL.iter().enumerate() {
            positions[slot] = headers
                .iter()
                .position(|h| h.as_ref().trim() == column.header())
                .with_context(|| format!("catalog missing '{}' column", column.header()))?;
        }
        Ok(ColumnIndex { positions })
    }

    fn contains_all<S: AsRef<str>>(headers: &[S]) -> bool {
        Column::ALL
            .iter()
            .all(|c| headers.iter().any(|h| h.as_ref().trim() == c.header()))
    }

    fn record<'a>(&self, get: impl Fn(usize) -> Option<&'a str>) -> RawRecord {
        RawRecord::from_fn(|column| RawValue::from_token(get(self.positions[column as usize])))
    }
}

// ---------------------------------------------------------------------------
// Whitespace ASCII loader
// ---------------------------------------------------------------------------

/// Astropy-style ASCII table: the first non-comment line is the header,
/// `#` lines are comments, columns are separated by runs of blanks and
/// string cells may be double-quoted. A commented header
/// (`# Name logN_HI ...`) is accepted when no plain header precedes it.
fn load_ascii(path: &Path) -> Result<Vec<RawRecord>> {
    let text = std::fs::read_to_string(path).context("reading ASCII catalog")?;
    parse_ascii(&text)
}

fn parse_ascii(text: &str) -> Result<Vec<RawRecord>> {
    let normalized = text.replace('\t', " ");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .from_reader(normalized.as_bytes());

    let mut index: Option<ColumnIndex> = None;
    let mut records = Vec::new();

    for (line_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("ASCII line {line_no}"))?;
        // Runs of blanks produce empty fields; drop them.
        let tokens: Vec<&str> = record.iter().filter(|t| !t.is_empty()).collect();
        let Some(first) = tokens.first() else {
            continue;
        };

        if first.starts_with('#') {
            if index.is_none() {
                let header = commented_header(&tokens);
                if ColumnIndex::contains_all(&header) {
                    index = Some(ColumnIndex::from_headers(&header)?);
                }
            }
            continue;
        }

        match &index {
            None => index = Some(ColumnIndex::from_headers(&tokens)?),
            Some(idx) => records.push(idx.record(|i| tokens.get(i).copied())),
        }
    }

    if index.is_none() {
        bail!("ASCII catalog has no header line");
    }
    Ok(records)
}

fn commented_header<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    tokens
        .iter()
        .map(|t| t.trim_start_matches('#'))
        .filter(|t| !t.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one component per row.
fn load_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let index = ColumnIndex::from_headers(&headers)?;

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        records.push(index.record(|i| record.get(i)));
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "Name": "J1234+5678", "logN_HI": 20.1, "Ion": "SiII",
///     "v_i": 10.0, "log_N_i": 14.5, "b_i": 25.0 },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<RawRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

fn parse_json(text: &str) -> Result<Vec<RawRecord>> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let rows = root.as_array().context("Expected top-level JSON array")?;

    rows.iter()
        .enumerate()
        .map(|(i, rec)| {
            let obj = rec
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            Ok(RawRecord::from_fn(|column| {
                json_to_raw(obj.get(column.header()))
            }))
        })
        .collect()
}

fn json_to_raw(val: Option<&JsonValue>) -> RawValue {
    match val {
        Some(JsonValue::String(s)) => RawValue::from_token(Some(s.as_str())),
        Some(JsonValue::Number(n)) => match n.as_f64() {
            Some(f) => RawValue::Number(f),
            None => RawValue::Text(n.to_string()),
        },
        Some(JsonValue::Null) | None => RawValue::Null,
        Some(other) => RawValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet catalog.
///
/// Expected schema: `Name` and `Ion` as Utf8/LargeUtf8, the numeric columns
/// as Float64, Float32, Int32 or Int64. Other columns are ignored.
fn load_parquet(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let mut columns = Vec::with_capacity(Column::ALL.len());
        for column in Column::ALL {
            let idx = schema
                .index_of(column.header())
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{}' column", column.header()))?;
            columns.push(batch.column(idx).clone());
        }

        for row in 0..batch.num_rows() {
            records.push(RawRecord::from_fn(|column| {
                extract_raw_value(&columns[column as usize], row)
            }));
        }
    }

    Ok(records)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_raw_value(col: &Arc<dyn Array>, row: usize) -> RawValue {
    if col.is_null(row) {
        return RawValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| RawValue::from_token(Some(s.value(row))))
            .unwrap_or(RawValue::Null),
        DataType::LargeUtf8 => col
            .as_any()
            .downcast_ref::<LargeStringArray>()
            .map(|s| RawValue::from_token(Some(s.value(row))))
            .unwrap_or(RawValue::Null),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|a| RawValue::Number(a.value(row) as f64))
            .unwrap_or(RawValue::Null),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| RawValue::Number(a.value(row) as f64))
            .unwrap_or(RawValue::Null),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| RawValue::Number(a.value(row) as f64))
            .unwrap_or(RawValue::Null),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| RawValue::Number(a.value(row)))
            .unwrap_or(RawValue::Null),
        DataType::Utf8View => RawValue::from_token(Some(col.as_string_view().value(row))),
        other => RawValue::Text(format!("{other:?}")),
    }
}
