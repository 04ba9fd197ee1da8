// Raw table loading from CSV or Excel bytes

use crate::error::{EdaError, Result};
use crate::table::{Column, Table, Value};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// Largest header row index a caller may ask for
pub const MAX_HEADER_ROW: usize = 100;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Cell text read as a missing value
const MISSING_TOKENS: &[&str] = &["NaN", "nan", "NA", "N/A", "n/a", "NULL", "null", "None"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Excel,
    Csv,
}

impl FileType {
    /// Guess from the file extension; anything unrecognised is CSV.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => FileType::Excel,
            _ => FileType::Csv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadOptions {
    pub file_type: FileType,
    /// Worksheet to read; the first sheet when unset. Ignored for CSV.
    pub sheet: Option<String>,
    /// Zero-based row holding the column names
    pub header_row: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            file_type: FileType::Csv,
            sheet: None,
            header_row: 0,
        }
    }
}

/// Parse raw bytes into a typed table.
pub fn load_table(bytes: &[u8], options: &LoadOptions) -> Result<Table> {
    if options.header_row > MAX_HEADER_ROW {
        return Err(EdaError::HeaderRowOutOfRange {
            row: options.header_row,
            max: MAX_HEADER_ROW,
        });
    }

    let rows = match options.file_type {
        FileType::Csv => read_csv_rows(bytes)?,
        FileType::Excel => read_excel_rows(bytes, options.sheet.as_deref())?,
    };
    let table = build_table(rows, options.header_row)?;
    debug!(
        "loaded {:?} table: {} rows x {} columns",
        options.file_type,
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Worksheet names of a workbook, in workbook order
pub fn sheet_names(bytes: &[u8]) -> Result<Vec<String>> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    Ok(workbook.sheet_names())
}

fn read_csv_rows(bytes: &[u8]) -> Result<Vec<Vec<Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if is_missing(cell) {
                        Value::Null
                    } else {
                        Value::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn read_excel_rows(bytes: &[u8], sheet: Option<&str>) -> Result<Vec<Vec<Value>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let available = workbook.sheet_names();

    let sheet = match sheet {
        Some(name) => {
            if !available.iter().any(|s| s == name) {
                return Err(EdaError::UnknownSheet {
                    sheet: name.to_string(),
                    available,
                });
            }
            name.to_string()
        }
        None => available.first().cloned().ok_or(EdaError::EmptyInput)?,
    };

    let range = workbook.worksheet_range(&sheet)?;

    // Ranges start at the first used cell; restore the empty rows above it
    // so header row indices match the sheet.
    let leading = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows: Vec<Vec<Value>> = vec![Vec::new(); leading];
    rows.extend(
        range
            .rows()
            .map(|r| r.iter().map(excel_cell_to_value).collect::<Vec<_>>()),
    );
    Ok(rows)
}

fn excel_cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if is_missing(s) => Value::Null,
        Data::Float(f) if !f.is_finite() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Convert a serial date in the 1900 date system.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || MISSING_TOKENS.contains(&cell)
}

/// Finite floats only; `inf` stays text
fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Turn raw rows into a table using the row at `header_row` for names.
fn build_table(mut rows: Vec<Vec<Value>>, header_row: usize) -> Result<Table> {
    if rows.len() <= header_row {
        return Err(EdaError::EmptyInput);
    }
    let data_rows = rows.split_off(header_row + 1);
    let header = rows.pop().unwrap_or_default();

    let width = data_rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let names = column_names(&header, width);
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(data_rows.len()); width];
    for row in data_rows {
        let mut cells = row.into_iter();
        for column in columns.iter_mut() {
            column.push(cells.next().unwrap_or(Value::Null));
        }
    }

    let columns = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, infer_values(values)))
        .collect();
    Table::new(columns)
}

/// Header cells to unique names. Blank cells become `Unnamed: <i>`,
/// repeats get `.1`, `.2`, ... suffixes.
fn column_names(header: &[Value], width: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    (0..width)
        .map(|i| {
            let base = match header.get(i) {
                Some(Value::Null) | None => format!("Unnamed: {}", i),
                Some(v) => v.to_string(),
            };
            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}.{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// Settle a column on a single type where its cells allow it.
fn infer_values(values: Vec<Value>) -> Vec<Value> {
    let all_text = values
        .iter()
        .all(|v| matches!(v, Value::Null | Value::Text(_)));

    if !all_text {
        return collapse_integral_floats(values);
    }

    let texts: Vec<&str> = values
        .iter()
        .filter_map(|v| match v {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    if texts.is_empty() {
        return values;
    }

    if texts.iter().all(|s| parse_bool(s).is_some()) {
        return convert(values, |s| parse_bool(s).map(Value::Bool));
    }
    if texts.iter().all(|s| s.trim().parse::<i64>().is_ok()) {
        return convert(values, |s| s.trim().parse::<i64>().ok().map(Value::Int));
    }
    if texts.iter().all(|s| parse_float(s).is_some()) {
        return convert(values, |s| parse_float(s).map(Value::Float));
    }
    if texts.iter().all(|s| parse_datetime(s).is_some()) {
        return convert(values, |s| parse_datetime(s).map(Value::DateTime));
    }
    values
}

fn convert<F>(values: Vec<Value>, parse: F) -> Vec<Value>
where
    F: Fn(&str) -> Option<Value>,
{
    values
        .into_iter()
        .map(|v| match v {
            Value::Text(s) => parse(&s).unwrap_or(Value::Text(s)),
            other => other,
        })
        .collect()
}

fn collapse_integral_floats(values: Vec<Value>) -> Vec<Value> {
    let integral = values.iter().all(|v| match v {
        Value::Null | Value::Int(_) => true,
        Value::Float(f) => f.fract() == 0.0 && f.abs() < i64::MAX as f64,
        _ => false,
    });
    if !integral {
        return values;
    }
    values
        .into_iter()
        .map(|v| match v {
            Value::Float(f) => Value::Int(f as i64),
            other => other,
        })
        .collect()
}

/// Identity of one load: where the bytes came from plus how they are parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadKey {
    pub source: String,
    pub options: LoadOptions,
}

/// Single-slot memo for the load step. Asking again with the same key
/// returns the stored table; any other key reloads and replaces it.
#[derive(Debug, Default)]
pub struct LoadCache {
    slot: Option<(LoadKey, Arc<Table>)>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&mut self, key: LoadKey, read: F) -> Result<Arc<Table>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if let Some((cached_key, table)) = &self.slot {
            if *cached_key == key {
                info!("load cache hit for '{}'", key.source);
                return Ok(Arc::clone(table));
            }
        }

        info!("load cache miss for '{}'", key.source);
        let bytes = read()?;
        let table = Arc::new(load_table(&bytes, &key.options)?);
        self.slot = Some((key, Arc::clone(&table)));
        Ok(table)
    }
}
