// Date/time bucketing for line-chart grouping

use crate::error::{EdaError, Result};
use crate::table::{Column, Table, Value};
use chrono::{Datelike, NaiveTime};
use log::debug;
use std::fmt;

/// How to coarsen a date/time grouping field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bucketing {
    #[default]
    None,
    Year,
    Month,
    YearMonth,
}

impl Bucketing {
    /// Tick label rotation hint in degrees
    pub fn rotation(&self) -> u32 {
        match self {
            Bucketing::YearMonth => 90,
            Bucketing::None | Bucketing::Year | Bucketing::Month => 45,
        }
    }

    /// Granularity name for titles; `None` has none.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Bucketing::None => None,
            Bucketing::Year => Some("Year"),
            Bucketing::Month => Some("Month"),
            Bucketing::YearMonth => Some("Year-Month"),
        }
    }
}

impl fmt::Display for Bucketing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().unwrap_or("none"))
    }
}

/// Rewrite one column's values into bucket keys. Returns a new column.
///
/// `Year` and `Month` pass nulls through. `YearMonth` refuses any null.
pub fn bucket_column(column: &Column, mode: Bucketing) -> Result<Column> {
    if mode == Bucketing::None {
        return Ok(column.clone());
    }

    if !column.is_temporal() {
        return Err(EdaError::NotDateTimeColumn {
            column: column.name.clone(),
            found: column.field_type().to_string(),
        });
    }

    if mode == Bucketing::YearMonth {
        let nulls = column.null_count();
        if nulls > 0 {
            return Err(EdaError::NullDateTimeValues {
                column: column.name.clone(),
                nulls,
            });
        }
    }

    let values = column
        .values
        .iter()
        .map(|v| match v.as_datetime() {
            None => Value::Null,
            Some(dt) => match mode {
                Bucketing::Year => Value::Int(i64::from(dt.year())),
                Bucketing::Month => Value::Int(i64::from(dt.month())),
                Bucketing::YearMonth => {
                    let first = dt.date().with_day(1).unwrap_or(dt.date());
                    Value::DateTime(first.and_time(NaiveTime::MIN))
                }
                Bucketing::None => v.clone(),
            },
        })
        .collect();

    debug!("bucketed '{}' by {}", column.name, mode);
    Ok(Column::new(column.name.clone(), values))
}

/// Copy of `table` with `field` bucketed; `table` itself is unchanged.
pub fn bucket_table(table: &Table, field: &str, mode: Bucketing) -> Result<Table> {
    let idx = table.column_index(field)?;
    if mode == Bucketing::None {
        return Ok(table.clone());
    }
    let bucketed = bucket_column(&table.columns()[idx], mode)?;
    table.with_column(idx, bucketed)
}
