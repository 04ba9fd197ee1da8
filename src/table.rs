// In-memory table model shared by every stage

use crate::data::DataGrid;
use crate::error::{EdaError, Result};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A single cell.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value; only `Int` and `Float` qualify.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Type of a non-null value. Nulls carry no type.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Int(_) | Value::Float(_) => Some(FieldType::Numeric),
            Value::Text(_) => Some(FieldType::Text),
            Value::Bool(_) => Some(FieldType::Boolean),
            Value::DateTime(_) => Some(FieldType::DateTime),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::DateTime(_) => 3,
            Value::Text(_) => 4,
        }
    }
}

// Total order so values can key a BTreeMap: nulls first, then booleans,
// numbers (ints and floats compare numerically), date/times, text.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(dt) => {
                if dt.time() == NaiveTime::MIN {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            Value::Float(_) => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::DateTime(_) => serializer.collect_str(self),
        }
    }
}

/// Inferred column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Numeric,
    Text,
    DateTime,
    Boolean,
    Other,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Numeric => "numeric",
            FieldType::Text => "text",
            FieldType::DateTime => "datetime",
            FieldType::Boolean => "boolean",
            FieldType::Other => "other",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// A column has a type only if all its non-null values agree on one.
    /// Mixed and all-null columns are `Other`.
    pub fn field_type(&self) -> FieldType {
        let mut found: Option<FieldType> = None;
        for ft in self.values.iter().filter_map(Value::field_type) {
            match found {
                None => found = Some(ft),
                Some(prev) if prev != ft => return FieldType::Other,
                Some(_) => {}
            }
        }
        found.unwrap_or(FieldType::Other)
    }

    /// True when every non-null value is numeric (vacuously true when all null).
    pub fn is_numeric(&self) -> bool {
        self.values
            .iter()
            .all(|v| v.is_null() || v.as_f64().is_some())
    }

    /// True when every non-null value is a date/time (vacuously true when all null).
    pub fn is_temporal(&self) -> bool {
        self.values
            .iter()
            .all(|v| v.is_null() || v.as_datetime().is_some())
    }
}

/// Ordered set of equal-length, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(EdaError::RaggedTable {
                    column: bad.name.clone(),
                    found: bad.len(),
                    expected,
                });
            }
        }
        Ok(Self { columns })
    }

    /// Build from columns already known to share a length.
    pub(crate) fn from_aligned(columns: Vec<Column>) -> Self {
        debug_assert!(columns.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Find a column by name: exact match first, then ASCII case-insensitive.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| EdaError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        let idx = self.column_index(name)?;
        Ok(&self.columns[idx])
    }

    pub fn columns_of_type(&self, field_type: FieldType) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.field_type() == field_type)
            .collect()
    }

    /// New table with the column at `idx` swapped out; `self` is untouched.
    pub fn with_column(&self, idx: usize, column: Column) -> Result<Table> {
        let mut columns = self.columns.clone();
        columns[idx] = column;
        Table::new(columns)
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.values.iter().take(n).cloned().collect()))
            .collect();
        Table { columns }
    }

    pub fn to_grid(&self) -> DataGrid {
        let headers = self.columns.iter().map(|c| c.name.clone()).collect();
        let rows = (0..self.row_count())
            .map(|r| self.columns.iter().map(|c| c.values[r].to_string()).collect())
            .collect();
        DataGrid::new(headers, rows)
    }
}
