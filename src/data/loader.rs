use std::collections::HashSet;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type};
use arrow::util::display::array_value_to_string;
use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use chrono::NaiveTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Dataset, Record};
use crate::error::LoadError;

/// Label substituted for missing, empty and null-marker values.
pub const NOT_RECORDED: &str = "Not recorded";
/// Literal token some exports write for missing values.
pub const NULL_MARKER: &str = "[NULL]";
/// Header spreadsheet exporters give to a leaked row-index column.
pub const JUNK_INDEX_COLUMN: &str = "Unnamed: 0";
/// Workbook extensions handed to calamine.
pub const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

// ---------------------------------------------------------------------------
// Cleaning rules
// ---------------------------------------------------------------------------

/// One-time normalisation applied to every freshly parsed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningRules {
    /// Replacement for missing / empty / null-marker text values.
    pub sentinel: String,
    /// Literal values treated as missing.
    pub null_markers: Vec<String>,
    /// Columns dropped after name trimming.
    pub junk_columns: Vec<String>,
    /// Columns that must exist and are always normalised as text.
    pub categorical: Vec<String>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            sentinel: NOT_RECORDED.to_string(),
            null_markers: vec![NULL_MARKER.to_string()],
            junk_columns: vec![JUNK_INDEX_COLUMN.to_string()],
            categorical: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and clean a follow-up table.
///
/// The categorical columns named in `rules` must be present after cleaning.
pub fn load(path: &Path, rules: &CleaningRules) -> Result<Dataset, LoadError> {
    let raw = read_file(path, &rules.categorical)?;
    let dataset = clean(raw, rules)?;

    for field in &rules.categorical {
        if dataset.column_index(field).is_none() {
            return Err(LoadError::MissingColumn(field.clone()));
        }
    }

    log::info!(
        "Loaded {} records with columns {:?} from {}",
        dataset.len(),
        dataset.columns,
        path.display()
    );
    Ok(dataset)
}

/// Parse a file into an uncleaned table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, cell types inferred per column (`text_columns` stay text)
/// * `.json`    – `[{ "column": value, ... }, ...]`
/// * `.parquet` – any flat schema
/// * `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods` – first sheet, first row is the header
pub fn read_file(path: &Path, text_columns: &[String]) -> Result<Dataset, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => read_csv(path, text_columns),
        "json" => read_json(path),
        "parquet" | "pq" => read_parquet(path),
        ext if SPREADSHEET_EXTENSIONS.contains(&ext) => read_spreadsheet(path),
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

/// Normalise a parsed table.
///
/// * column names are trimmed; collisions are rejected
/// * junk columns are dropped
/// * text-like columns (any text cell, or categorical) become all-text:
///   values are trimmed and missing / empty / null-marker values become the sentinel
///
/// Applying `clean` to its own output changes nothing.
pub fn clean(dataset: Dataset, rules: &CleaningRules) -> Result<Dataset, LoadError> {
    let Dataset { columns, records } = dataset;
    let names: Vec<String> = columns.iter().map(|c| c.trim().to_string()).collect();

    let keep: Vec<usize> = (0..names.len())
        .filter(|&i| {
            let junk = rules.junk_columns.iter().any(|j| *j == names[i]);
            if junk {
                log::debug!("Dropping junk column '{}'", names[i]);
            }
            !junk
        })
        .collect();

    let mut seen = HashSet::new();
    for &i in &keep {
        if !seen.insert(names[i].as_str()) {
            return Err(LoadError::DuplicateColumn(names[i].clone()));
        }
    }

    let text_like: Vec<bool> = keep
        .iter()
        .map(|&i| {
            rules.categorical.contains(&names[i])
                || records
                    .iter()
                    .any(|rec| matches!(rec.get(i), CellValue::Text(_)))
        })
        .collect();

    let records = records
        .iter()
        .map(|rec| {
            let values = keep
                .iter()
                .zip(&text_like)
                .map(|(&i, &is_text)| {
                    let value = rec.get(i);
                    if is_text {
                        normalize_text(value, rules)
                    } else {
                        value.clone()
                    }
                })
                .collect();
            Record::new(values)
        })
        .collect();

    let columns = keep.iter().map(|&i| names[i].clone()).collect();
    Ok(Dataset::new(columns, records))
}

fn normalize_text(value: &CellValue, rules: &CleaningRules) -> CellValue {
    let rendered = match value {
        CellValue::Null => return CellValue::Text(rules.sentinel.clone()),
        other => other.to_string(),
    };
    let trimmed = rendered.trim();
    if trimmed.is_empty() || rules.null_markers.iter().any(|m| m == trimmed) {
        CellValue::Text(rules.sentinel.clone())
    } else {
        CellValue::Text(trimmed.to_string())
    }
}

/// Blank headers get the `Unnamed: <index>` name spreadsheet exporters use.
fn header_name(idx: usize, raw: &str) -> String {
    if raw.trim().is_empty() {
        format!("Unnamed: {idx}")
    } else {
        raw.to_string()
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV cells are typed per column, never per cell: a column becomes numeric
/// or boolean only when every non-empty cell parses as such.  Columns in
/// `text_columns` always keep the literal strings (`"007"` stays `"007"`).
fn read_csv(path: &Path, text_columns: &[String]) -> Result<Dataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(i, h))
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        rows.push(result?);
    }

    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0).max(columns.len());
    let kinds: Vec<CsvKind> = (0..width)
        .map(|c| {
            let forced = columns
                .get(c)
                .is_some_and(|name| text_columns.iter().any(|t| t == name.trim()));
            if forced {
                CsvKind::Text
            } else {
                CsvKind::infer(rows.iter().filter_map(|r| r.get(c)))
            }
        })
        .collect();

    let records = rows
        .iter()
        .map(|row| {
            Record::new(
                row.iter()
                    .zip(&kinds)
                    .map(|(cell, kind)| kind.parse(cell))
                    .collect(),
            )
        })
        .collect();

    Ok(Dataset::new(columns, records))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsvKind {
    Integer,
    Float,
    Bool,
    Text,
}

impl CsvKind {
    /// Narrowest kind every non-empty cell fits.
    fn infer<'c>(cells: impl Iterator<Item = &'c str>) -> Self {
        let cells: Vec<&str> = cells.filter(|c| !c.is_empty()).collect();
        [CsvKind::Integer, CsvKind::Float, CsvKind::Bool]
            .into_iter()
            .find(|kind| cells.iter().all(|c| kind.accepts(c)))
            .unwrap_or(CsvKind::Text)
    }

    fn accepts(self, s: &str) -> bool {
        match self {
            CsvKind::Integer => s.parse::<i64>().is_ok(),
            CsvKind::Float => s.parse::<f64>().is_ok_and(f64::is_finite),
            CsvKind::Bool => s == "true" || s == "false",
            CsvKind::Text => true,
        }
    }

    fn parse(self, s: &str) -> CellValue {
        if s.is_empty() {
            return CellValue::Null;
        }
        match self {
            CsvKind::Integer => s.parse::<i64>().map_or_else(|_| CellValue::text(s), CellValue::Integer),
            CsvKind::Float => s.parse::<f64>().map_or_else(|_| CellValue::text(s), CellValue::Float),
            CsvKind::Bool => CellValue::Bool(s == "true"),
            CsvKind::Text => CellValue::text(s),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "Estado Real  1": "Activo", "gender": "Femenino", "EPS1": "[NULL]" },
///   ...
/// ]
/// ```
///
/// Columns are ordered by first appearance; absent keys are `Null`.
fn read_json(path: &Path) -> Result<Dataset, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let root: JsonValue = serde_json::from_str(&text)?;

    let rows = root
        .as_array()
        .ok_or_else(|| LoadError::InvalidFormat("expected a top-level JSON array".into()))?;

    let mut objects = Vec::with_capacity(rows.len());
    let mut columns: Vec<String> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .ok_or_else(|| LoadError::InvalidFormat(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let records = objects
        .into_iter()
        .map(|obj| {
            Record::new(
                columns
                    .iter()
                    .map(|col| obj.get(col).map_or(CellValue::Null, json_to_cell))
                    .collect(),
            )
        })
        .collect();

    Ok(Dataset::new(columns, records))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet file; every column becomes a dataset column.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn read_parquet(path: &Path) -> Result<Dataset, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| header_name(i, f.name()))
        .collect();
    let reader = builder.build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            let values = batch
                .columns()
                .iter()
                .map(|col| extract_cell(col, row))
                .collect();
            records.push(Record::new(values));
        }
    }

    Ok(Dataset::new(columns, records))
}

/// Extract a single value from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            array_value_to_string(col, row).map_or(CellValue::Null, CellValue::Date)
        }
        _ => array_value_to_string(col, row).map_or(CellValue::Null, CellValue::Text),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

fn read_spreadsheet(path: &Path) -> Result<Dataset, LoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| LoadError::InvalidFormat("workbook contains no sheets".into()))?;
    let range = workbook.worksheet_range(&sheet)?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| LoadError::InvalidFormat(format!("sheet '{sheet}' has no header row")))?;
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(i, &spreadsheet_cell(cell).to_string()))
        .collect();

    let records = rows
        .map(|row| Record::new(row.iter().map(spreadsheet_cell).collect()))
        .collect();

    Ok(Dataset::new(columns, records))
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Float(*f),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(e.to_string()),
        Data::DateTime(dt) => excel_date(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Date(s.clone()),
    }
}

/// Date-formatted serials become ISO dates (`2024-01-15`, or with the time
/// when it is not midnight).  Durations keep the raw serial.
fn excel_date(dt: &ExcelDateTime) -> CellValue {
    match dt.as_datetime() {
        Some(at) if dt.is_datetime() => {
            let iso = if at.time() == NaiveTime::MIN {
                at.format("%Y-%m-%d").to_string()
            } else {
                at.format("%Y-%m-%d %H:%M:%S").to_string()
            };
            CellValue::Date(iso)
        }
        _ => CellValue::Float(dt.as_f64()),
    }
}
