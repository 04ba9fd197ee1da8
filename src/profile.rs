// Descriptive profiling: field types, summary statistics, value counts, shape

use crate::data::DataGrid;
use crate::error::{EdaError, Result};
use crate::table::{Column, FieldType, Table, Value};
use chrono::DateTime;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

pub const NULL_COUNT_ROW: &str = "null count";
const STAT_ROWS: [&str; 11] = [
    "count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%", "max",
];

/// Which view of the table to compute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileRequest {
    FieldDescriptions,
    SummaryStatistics,
    ValueCounts { column: String },
    DataDimensions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub stat: String,
    /// One cell per column; `None` where the statistic does not apply
    pub values: Vec<Option<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn row(&self, stat: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.stat == stat)
    }

    /// Cell for a statistic and column name
    pub fn get(&self, stat: &str, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.row(stat)?.values.get(idx)?.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Value,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Profile {
    FieldDescriptions { fields: Vec<FieldDescriptor> },
    SummaryStatistics { summary: SummaryTable },
    ValueCounts { column: String, counts: Vec<ValueCount> },
    DataDimensions { rows: usize, columns: usize },
}

/// Compute one profiling view of `table`.
pub fn profile(table: &Table, request: &ProfileRequest) -> Result<Profile> {
    debug!("profiling {:?}", request);
    match request {
        ProfileRequest::FieldDescriptions => Ok(Profile::FieldDescriptions {
            fields: field_descriptions(table),
        }),
        ProfileRequest::SummaryStatistics => Ok(Profile::SummaryStatistics {
            summary: summary_statistics(table),
        }),
        ProfileRequest::ValueCounts { column } => {
            let counts = value_counts(table, column)?;
            Ok(Profile::ValueCounts {
                column: table.column(column)?.name.clone(),
                counts,
            })
        }
        ProfileRequest::DataDimensions => Ok(Profile::DataDimensions {
            rows: table.row_count(),
            columns: table.column_count(),
        }),
    }
}

/// Names of the text columns, in table order
pub fn text_columns(table: &Table) -> Vec<&str> {
    table
        .columns_of_type(FieldType::Text)
        .into_iter()
        .map(|c| c.name.as_str())
        .collect()
}

/// (name, type) for every column, ordered by type name descending; ties
/// keep table order.
pub fn field_descriptions(table: &Table) -> Vec<FieldDescriptor> {
    let mut fields: Vec<FieldDescriptor> = table
        .columns()
        .iter()
        .map(|c| FieldDescriptor {
            name: c.name.clone(),
            field_type: c.field_type(),
        })
        .collect();
    fields.sort_by(|a, b| b.field_type.name().cmp(a.field_type.name()));
    fields
}

pub fn summary_statistics(table: &Table) -> SummaryTable {
    let described: Vec<Vec<Option<Value>>> = table.columns().iter().map(describe_column).collect();

    let mut rows = vec![SummaryRow {
        stat: NULL_COUNT_ROW.to_string(),
        values: table
            .columns()
            .iter()
            .map(|c| Some(Value::Int(c.null_count() as i64)))
            .collect(),
    }];
    for (i, stat) in STAT_ROWS.iter().enumerate() {
        rows.push(SummaryRow {
            stat: stat.to_string(),
            values: described.iter().map(|d| d[i].clone()).collect(),
        });
    }

    SummaryTable {
        columns: table.column_names().iter().map(|s| s.to_string()).collect(),
        rows,
    }
}

/// Distinct values of a text column with their counts, most frequent first.
/// Nulls are not counted.
pub fn value_counts(table: &Table, column: &str) -> Result<Vec<ValueCount>> {
    if table.columns_of_type(FieldType::Text).is_empty() {
        return Err(EdaError::NoTextColumns);
    }
    let col = table.column(column)?;
    let found = col.field_type();
    if found != FieldType::Text {
        return Err(EdaError::NotTextColumn {
            column: col.name.clone(),
            found: found.to_string(),
        });
    }
    Ok(tally(&col.values)
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect())
}

/// Count non-null values, ordered by count descending then first appearance.
fn tally(values: &[Value]) -> Vec<(Value, usize)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(Value, usize)> = Vec::new();
    for v in values.iter().filter(|v| !v.is_null()) {
        // Keyed by display text plus type so 1 and "1" stay apart
        let key = format!("{:?}:{}", v.field_type(), v);
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((v.clone(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Cells for `STAT_ROWS` for one column.
fn describe_column(col: &Column) -> Vec<Option<Value>> {
    let mut cells: Vec<Option<Value>> = vec![None; STAT_ROWS.len()];
    let count = col.len() - col.null_count();
    cells[0] = Some(Value::Int(count as i64));

    match col.field_type() {
        FieldType::Numeric => {
            let mut nums: Vec<f64> = col.values.iter().filter_map(Value::as_f64).collect();
            nums.sort_by(|a, b| a.total_cmp(b));
            for (slot, stat) in cells[4..].iter_mut().zip(numeric_stats(&nums)) {
                *slot = stat.map(|v| Value::Float(round2(v)));
            }
        }
        FieldType::DateTime => {
            let mut millis: Vec<f64> = col
                .values
                .iter()
                .filter_map(Value::as_datetime)
                .map(|dt| dt.and_utc().timestamp_millis() as f64)
                .collect();
            millis.sort_by(|a, b| a.total_cmp(b));
            let [mean, _std, min, q1, median, q3, max] = numeric_stats(&millis);
            cells[4] = mean.and_then(millis_to_value);
            let rest = [min, q1, median, q3, max];
            for (slot, stat) in cells[6..].iter_mut().zip(rest) {
                *slot = stat.and_then(millis_to_value);
            }
        }
        FieldType::Text | FieldType::Boolean | FieldType::Other => {
            let counts = tally(&col.values);
            cells[1] = Some(Value::Int(counts.len() as i64));
            if let Some((top, freq)) = counts.into_iter().next() {
                cells[2] = Some(top);
                cells[3] = Some(Value::Int(freq as i64));
            }
        }
    }
    cells
}

/// mean, sample std, min, 25%, 50%, 75%, max of sorted data
fn numeric_stats(sorted: &[f64]) -> [Option<f64>; 7] {
    if sorted.is_empty() {
        return [None; 7];
    }
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std = if sorted.len() > 1 {
        let var = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(var.sqrt())
    } else {
        None
    };
    [
        Some(mean),
        std,
        Some(sorted[0]),
        Some(percentile(sorted, 0.25)),
        Some(percentile(sorted, 0.5)),
        Some(percentile(sorted, 0.75)),
        Some(sorted[sorted.len() - 1]),
    ]
}

/// Linear interpolation between closest ranks.
fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn millis_to_value(ms: f64) -> Option<Value> {
    DateTime::from_timestamp_millis(ms.round() as i64)
        .map(|dt| Value::DateTime(dt.naive_utc()))
}

impl Profile {
    /// Tabular rendering of the profile; inapplicable cells are empty.
    pub fn to_grid(&self) -> DataGrid {
        match self {
            Profile::FieldDescriptions { fields } => DataGrid::new(
                vec!["Field Name".to_string(), "Field Type".to_string()],
                fields
                    .iter()
                    .map(|f| vec![f.name.clone(), f.field_type.to_string()])
                    .collect(),
            ),
            Profile::SummaryStatistics { summary } => {
                let mut headers = vec![String::new()];
                headers.extend(summary.columns.iter().cloned());
                let rows = summary
                    .rows
                    .iter()
                    .map(|r| {
                        let mut row = vec![r.stat.clone()];
                        row.extend(
                            r.values
                                .iter()
                                .map(|v| v.as_ref().map(Value::to_string).unwrap_or_default()),
                        );
                        row
                    })
                    .collect();
                DataGrid::new(headers, rows)
            }
            Profile::ValueCounts { column, counts } => DataGrid::new(
                vec![column.clone(), "Count".to_string()],
                counts
                    .iter()
                    .map(|c| vec![c.value.to_string(), c.count.to_string()])
                    .collect(),
            ),
            Profile::DataDimensions { rows, columns } => DataGrid::new(
                vec!["Rows".to_string(), "Columns".to_string()],
                vec![vec![rows.to_string(), columns.to_string()]],
            ),
        }
    }
}
