// Schema normalization applied once after loading

use crate::table::{Column, FieldType, Table, Value};
use log::debug;
use serde::Deserialize;
use std::collections::HashSet;

pub const INDEX_COLUMN: &str = "Index";
const FALLBACK_INDEX_COLUMN: &str = "Level 0";

/// What to do with missing entries in text columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
    /// Replace nulls in text columns with the empty string
    #[default]
    Fill,
    /// Leave nulls in place
    Preserve,
}

/// Produce the normalized copy of `table`:
/// - underscores in names become spaces, then names are title-cased
/// - a leading positional `Index` column is added (unless already present)
/// - with `NullPolicy::Fill`, text columns get "" for nulls
///
/// The input is never modified.
pub fn normalize(table: &Table, policy: NullPolicy) -> Table {
    let mut seen = HashSet::new();
    let mut columns: Vec<Column> = table
        .columns()
        .iter()
        .map(|c| {
            let name = unique_name(&normalize_name(&c.name), &mut seen);
            let values = match policy {
                NullPolicy::Fill if c.field_type() == FieldType::Text => fill_nulls(&c.values),
                _ => c.values.clone(),
            };
            Column::new(name, values)
        })
        .collect();

    let positions: Vec<Value> = (0..table.row_count()).map(|i| Value::Int(i as i64)).collect();
    if has_index_column(&columns) {
        columns[0].values = positions;
    } else {
        let name = if seen.contains(INDEX_COLUMN) {
            unique_name(FALLBACK_INDEX_COLUMN, &mut seen)
        } else {
            INDEX_COLUMN.to_string()
        };
        columns.insert(0, Column::new(name, positions));
    }

    debug!(
        "normalized {} columns ({:?} nulls)",
        columns.len(),
        policy
    );
    Table::from_aligned(columns)
}

/// `order_date` -> `Order Date`
pub fn normalize_name(name: &str) -> String {
    title_case(&name.replace('_', " "))
}

/// Upper-case a letter that follows a non-letter, lower-case every other
/// letter. Digits and punctuation both start a new word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

fn unique_name(base: &str, seen: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    while !seen.insert(name.clone()) {
        name = format!("{}.{}", base, n);
        n += 1;
    }
    name
}

/// A leading index-named column holding exactly 0..n marks an already
/// normalized table.
fn has_index_column(columns: &[Column]) -> bool {
    match columns.first() {
        Some(first) if is_index_name(&first.name) => first
            .values
            .iter()
            .enumerate()
            .all(|(i, v)| matches!(v, Value::Int(p) if *p == i as i64)),
        _ => false,
    }
}

/// `Index`, or the `Level 0` name used when `Index` was taken
fn is_index_name(name: &str) -> bool {
    name == INDEX_COLUMN
        || name
            .strip_prefix(FALLBACK_INDEX_COLUMN)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with('.'))
}

fn fill_nulls(values: &[Value]) -> Vec<Value> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => Value::Text(String::new()),
            other => other.clone(),
        })
        .collect()
}
