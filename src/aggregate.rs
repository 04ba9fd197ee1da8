// Group-by aggregation ("pivot") used by both chart paths

use crate::data::DataGrid;
use crate::error::{EdaError, Result};
use crate::table::{Column, Table, Value};
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Rows kept by the bar path
pub const BAR_TOP_N: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggOp {
    Count,
    Sum,
    Mean,
}

impl AggOp {
    pub fn name(&self) -> &'static str {
        match self {
            AggOp::Count => "count",
            AggOp::Sum => "sum",
            AggOp::Mean => "mean",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AggOp::Count => "Count",
            AggOp::Sum => "Sum",
            AggOp::Mean => "Mean",
        }
    }

    fn requires_numeric(&self) -> bool {
        matches!(self, AggOp::Sum | AggOp::Mean)
    }
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRequest {
    pub group_by: String,
    pub values: Vec<String>,
    pub op: AggOp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub key: Value,
    /// One entry per value field; `None` when the group had nothing to average
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotResult {
    pub group_field: String,
    pub value_fields: Vec<String>,
    pub op: AggOp,
    pub rows: Vec<PivotRow>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    sum: f64,
}

impl Accumulator {
    fn push(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.count += 1;
        if let Some(v) = value.as_f64() {
            self.sum += v;
        }
    }

    fn finish(&self, op: AggOp) -> Option<f64> {
        match op {
            AggOp::Count => Some(self.count as f64),
            AggOp::Sum => Some(self.sum),
            AggOp::Mean if self.count == 0 => None,
            AggOp::Mean => Some(self.sum / self.count as f64),
        }
    }
}

/// Group `table` by `request.group_by` and reduce every value field with
/// `request.op`. One row per distinct non-null key, in ascending key order.
pub fn pivot(table: &Table, request: &PivotRequest) -> Result<PivotResult> {
    if request.values.is_empty() {
        return Err(EdaError::InvalidRequest(
            "at least one value field is required".to_string(),
        ));
    }

    let group_col = table.column(&request.group_by)?;
    let value_cols: Vec<&Column> = request
        .values
        .iter()
        .map(|name| table.column(name))
        .collect::<Result<_>>()?;

    if request.op.requires_numeric() {
        if let Some(bad) = value_cols.iter().find(|c| !c.is_numeric()) {
            return Err(EdaError::TypeMismatch {
                op: request.op.to_string(),
                column: bad.name.clone(),
                found: bad.field_type().to_string(),
            });
        }
    }

    let mut groups: BTreeMap<Value, Vec<Accumulator>> = BTreeMap::new();
    let mut null_keys = 0usize;
    for (row, key) in group_col.values.iter().enumerate() {
        if key.is_null() {
            null_keys += 1;
            continue;
        }
        let accs = groups
            .entry(key.clone())
            .or_insert_with(|| vec![Accumulator::default(); value_cols.len()]);
        for (acc, col) in accs.iter_mut().zip(&value_cols) {
            acc.push(&col.values[row]);
        }
    }
    if null_keys > 0 {
        warn!(
            "dropped {} rows with a null '{}' while grouping",
            null_keys, group_col.name
        );
    }

    let rows: Vec<PivotRow> = groups
        .into_iter()
        .map(|(key, accs)| PivotRow {
            key,
            values: accs.iter().map(|a| a.finish(request.op)).collect(),
        })
        .filter(|row| row.values.iter().any(Option::is_some))
        .collect();

    debug!(
        "pivot {} of {:?} by '{}': {} groups",
        request.op,
        request.values,
        group_col.name,
        rows.len()
    );

    Ok(PivotResult {
        group_field: group_col.name.clone(),
        value_fields: value_cols.iter().map(|c| c.name.clone()).collect(),
        op: request.op,
        rows,
    })
}

/// Single-field pivot, largest values first, at most `limit` groups.
pub fn top_groups(
    table: &Table,
    group_by: &str,
    value: &str,
    op: AggOp,
    limit: usize,
) -> Result<PivotResult> {
    let mut result = pivot(
        table,
        &PivotRequest {
            group_by: group_by.to_string(),
            values: vec![value.to_string()],
            op,
        },
    )?;
    result.sort_desc_by(0);
    result.rows.truncate(limit);
    Ok(result)
}

impl PivotResult {
    /// Stable sort on one value field, descending; missing and NaN values go last.
    pub fn sort_desc_by(&mut self, field: usize) {
        let rank = |row: &PivotRow| {
            row.values
                .get(field)
                .copied()
                .flatten()
                .filter(|v| !v.is_nan())
        };
        self.rows.sort_by(|a, b| match (rank(a), rank(b)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    pub fn keys(&self) -> Vec<&Value> {
        self.rows.iter().map(|r| &r.key).collect()
    }

    /// Values of one field across rows
    pub fn series(&self, field: usize) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|r| r.values.get(field).copied().flatten())
            .collect()
    }

    /// Smallest and largest group key
    pub fn key_range(&self) -> Option<(Value, Value)> {
        let min = self.rows.iter().map(|r| &r.key).min()?;
        let max = self.rows.iter().map(|r| &r.key).max()?;
        Some((min.clone(), max.clone()))
    }

    pub fn to_grid(&self) -> DataGrid {
        let mut headers = vec![self.group_field.clone()];
        headers.extend(self.value_fields.iter().cloned());
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut row = vec![r.key.to_string()];
                row.extend(r.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
                row
            })
            .collect();
        DataGrid::new(headers, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn make_table() -> Table {
        Table::new(vec![
            Column::new("Region", vec![text("A"), text("A"), text("B")]),
            Column::new("Sales", vec![Value::Int(10), Value::Int(20), Value::Int(5)]),
        ])
        .unwrap()
    }

    fn request(op: AggOp) -> PivotRequest {
        PivotRequest {
            group_by: "Region".to_string(),
            values: vec!["Sales".to_string()],
            op,
        }
    }

    fn pairs(result: &PivotResult) -> Vec<(String, f64)> {
        result
            .rows
            .iter()
            .map(|r| (r.key.to_string(), r.values[0].unwrap()))
            .collect()
    }

    #[test]
    fn test_pivot_sum() {
        let result = pivot(&make_table(), &request(AggOp::Sum)).unwrap();
        assert_eq!(pairs(&result), vec![("A".to_string(), 30.0), ("B".to_string(), 5.0)]);
    }

    #[test]
    fn test_pivot_count() {
        let result = pivot(&make_table(), &request(AggOp::Count)).unwrap();
        assert_eq!(pairs(&result), vec![("A".to_string(), 2.0), ("B".to_string(), 1.0)]);
    }

    #[test]
    fn test_pivot_mean() {
        let result = pivot(&make_table(), &request(AggOp::Mean)).unwrap();
        assert_eq!(pairs(&result), vec![("A".to_string(), 15.0), ("B".to_string(), 5.0)]);
    }

    #[test]
    fn test_sum_on_text_is_type_mismatch() {
        let req = PivotRequest {
            group_by: "Sales".to_string(),
            values: vec!["Region".to_string()],
            op: AggOp::Sum,
        };
        let err = pivot(&make_table(), &req).unwrap_err();
        assert!(matches!(err, EdaError::TypeMismatch { .. }));
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_count_on_text_is_allowed() {
        let req = PivotRequest {
            group_by: "Sales".to_string(),
            values: vec!["Region".to_string()],
            op: AggOp::Count,
        };
        let result = pivot(&make_table(), &req).unwrap();
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn test_count_skips_nulls_and_null_keys_are_dropped() {
        let table = Table::new(vec![
            Column::new("Region", vec![text("A"), text("A"), Value::Null]),
            Column::new("Sales", vec![Value::Int(1), Value::Null, Value::Int(3)]),
        ])
        .unwrap();
        let result = pivot(&table, &request(AggOp::Count)).unwrap();
        assert_eq!(pairs(&result), vec![("A".to_string(), 1.0)]);
    }

    #[test]
    fn test_mean_of_only_nulls_drops_group() {
        let table = Table::new(vec![
            Column::new("Region", vec![text("A"), text("B")]),
            Column::new("Sales", vec![Value::Int(4), Value::Null]),
        ])
        .unwrap();
        let result = pivot(&table, &request(AggOp::Mean)).unwrap();
        assert_eq!(result.keys(), vec![&text("A")]);
    }

    #[test]
    fn test_multiple_value_fields() {
        let table = Table::new(vec![
            Column::new("Year", vec![Value::Int(2021), Value::Int(2020), Value::Int(2021)]),
            Column::new("Sales", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            Column::new("Profit", vec![Value::Float(0.5), Value::Float(1.0), Value::Float(1.5)]),
        ])
        .unwrap();
        let req = PivotRequest {
            group_by: "Year".to_string(),
            values: vec!["Sales".to_string(), "Profit".to_string()],
            op: AggOp::Sum,
        };
        let result = pivot(&table, &req).unwrap();
        assert_eq!(result.keys(), vec![&Value::Int(2020), &Value::Int(2021)]);
        assert_eq!(result.series(0), vec![Some(2.0), Some(4.0)]);
        assert_eq!(result.series(1), vec![Some(1.0), Some(2.0)]);
        assert_eq!(result.key_range(), Some((Value::Int(2020), Value::Int(2021))));
    }

    #[test]
    fn test_top_groups_truncates_to_limit() {
        let keys: Vec<Value> = (0..25).map(|i| text(&format!("g{:02}", i))).collect();
        let sales: Vec<Value> = (0..25).map(Value::Int).collect();
        let table = Table::new(vec![Column::new("Group", keys), Column::new("Sales", sales)]).unwrap();

        let result = top_groups(&table, "Group", "Sales", AggOp::Sum, BAR_TOP_N).unwrap();
        assert_eq!(result.rows.len(), 20);
        assert_eq!(result.rows[0].key, text("g24"));
        assert_eq!(result.rows[19].key, text("g05"));
        let series = result.series(0);
        assert!(series.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_sort_desc_puts_nan_and_missing_last() {
        let row = |key: &str, value: Option<f64>| PivotRow {
            key: text(key),
            values: vec![value],
        };
        let mut result = PivotResult {
            group_field: "Region".to_string(),
            value_fields: vec!["Sales".to_string()],
            op: AggOp::Sum,
            rows: vec![
                row("A", Some(100.0)),
                row("B", Some(f64::NAN)),
                row("C", None),
                row("D", Some(50.0)),
            ],
        };
        result.sort_desc_by(0);
        let keys: Vec<String> = result.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["A", "D", "B", "C"]);
    }

    #[test]
    fn test_empty_values_rejected() {
        let req = PivotRequest {
            group_by: "Region".to_string(),
            values: vec![],
            op: AggOp::Count,
        };
        assert!(pivot(&make_table(), &req).is_err());
    }

    #[test]
    fn test_to_grid() {
        let result = pivot(&make_table(), &request(AggOp::Sum)).unwrap();
        let grid = result.to_grid();
        assert_eq!(grid.headers, vec!["Region", "Sales"]);
        assert_eq!(grid.rows[0], vec!["A", "30"]);
    }
}
