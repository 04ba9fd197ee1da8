use crate::aggregate::{pivot, top_groups, PivotRequest};
use crate::bucket::bucket_table;
use crate::error::{EdaError, Result};
use crate::ir::{BarRequest, ChartKind, ChartRequest, ChartSpec, LineRequest};
use crate::table::Table;
use log::info;

/// Resolve every request against the normalized table. The first failing
/// request aborts the whole batch.
pub fn resolve_charts(
    table: &Table,
    requests: &[ChartRequest],
    top_n: usize,
) -> Result<Vec<ChartSpec>> {
    let mut charts = Vec::new();
    for request in requests {
        charts.extend(resolve_chart(table, request, top_n)?);
    }
    info!(
        "resolved {} chart requests into {} charts",
        requests.len(),
        charts.len()
    );
    Ok(charts)
}

/// Resolve a single request; bar requests yield one chart per comparison field
pub fn resolve_chart(table: &Table, request: &ChartRequest, top_n: usize) -> Result<Vec<ChartSpec>> {
    match request {
        ChartRequest::Bar(bar) => resolve_bar(table, bar, top_n),
        ChartRequest::Line(line) => resolve_line(table, line).map(|chart| vec![chart]),
    }
}

fn resolve_bar(table: &Table, request: &BarRequest, top_n: usize) -> Result<Vec<ChartSpec>> {
    if request.compare_by.is_empty() {
        return Err(EdaError::InvalidRequest(
            "bar chart needs at least one comparison field".to_string(),
        ));
    }

    request
        .compare_by
        .iter()
        .map(|field| {
            let result = top_groups(table, field, &request.value, request.op, top_n)?;
            let value_field = result.value_fields[0].clone();
            Ok(ChartSpec {
                kind: ChartKind::Bar,
                title: format!(
                    "{} of {} by {}",
                    request.op.title(),
                    value_field,
                    result.group_field
                ),
                x_label: value_field.clone(),
                y_label: Some(result.group_field.clone()),
                series_labels: vec![value_field],
                rotation: 0,
                x_range: None,
                pivot: result,
            })
        })
        .collect()
}

fn resolve_line(table: &Table, request: &LineRequest) -> Result<ChartSpec> {
    if request.values.is_empty() {
        return Err(EdaError::InvalidRequest(
            "line chart needs at least one value field".to_string(),
        ));
    }

    // Bucketing works on a copy; `table` stays as loaded
    let bucketed = bucket_table(table, &request.x, request.bucketing)?;
    let result = pivot(
        &bucketed,
        &PivotRequest {
            group_by: request.x.clone(),
            values: request.values.clone(),
            op: request.op,
        },
    )?;

    let x_field = result.group_field.clone();
    let grouping = request
        .bucketing
        .label()
        .map(str::to_string)
        .unwrap_or_else(|| x_field.clone());
    let title = format!(
        "{} of {} by {} in grouping by {}",
        request.op.title(),
        result.value_fields.join(", "),
        x_field,
        grouping
    );

    Ok(ChartSpec {
        kind: ChartKind::Line,
        title,
        x_label: x_field,
        y_label: None,
        series_labels: result.value_fields.clone(),
        rotation: request.bucketing.rotation(),
        x_range: result.key_range(),
        pivot: result,
    })
}
