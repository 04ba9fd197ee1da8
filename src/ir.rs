use crate::aggregate::{AggOp, PivotResult};
use crate::bucket::Bucketing;
use crate::table::Value;
use serde::Serialize;

// =============================================================================
// Requests (what the user asked for)
// =============================================================================

/// One chart request, as parsed from the request language
#[derive(Debug, Clone, PartialEq)]
pub enum ChartRequest {
    Bar(BarRequest),
    Line(LineRequest),
}

/// Aggregate one value field, once per comparison field
#[derive(Debug, Clone, PartialEq)]
pub struct BarRequest {
    pub value: String,
    pub op: AggOp,
    pub compare_by: Vec<String>,
}

/// Aggregate value fields over a date/time axis
#[derive(Debug, Clone, PartialEq)]
pub struct LineRequest {
    pub values: Vec<String>,
    pub x: String,
    pub op: AggOp,
    pub bucketing: Bucketing,
}

// =============================================================================
// Resolved charts (what gets rendered)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

/// A pivot result plus everything the renderer needs to draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    /// Bar charts only; line charts label their series instead
    pub y_label: Option<String>,
    pub series_labels: Vec<String>,
    /// Tick label rotation hint in degrees
    pub rotation: u32,
    /// Inclusive x-axis range of the grouping keys (line charts)
    pub x_range: Option<(Value, Value)>,
    pub pivot: PivotResult,
}

impl ChartSpec {
    /// File-name friendly form of the title
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.title.len());
        for c in self.title.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        slug.trim_end_matches('-').to_string()
    }
}
