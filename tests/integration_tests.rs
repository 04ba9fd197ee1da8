use std::fs;
use std::process::{Command, Output};

/// Run the pivotplot binary with the given arguments
fn run_pivotplot(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pivotplot"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run pivotplot")
}

fn stdout_of(args: &[&str]) -> String {
    let output = run_pivotplot(args);
    assert!(
        output.status.success(),
        "pivotplot {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn json_of(args: &[&str]) -> serde_json::Value {
    serde_json::from_str(&stdout_of(args)).unwrap()
}

fn stderr_of_failure(args: &[&str]) -> String {
    let output = run_pivotplot(args);
    assert!(!output.status.success(), "pivotplot {:?} unexpectedly succeeded", args);
    assert!(output.stdout.is_empty(), "failed request wrote output");
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

#[test]
fn test_preview_normalizes_names() {
    let out = stdout_of(&["test/sales.csv", "preview", "--rows", "2"]);
    let mut lines = out.lines();
    let header = lines.next().unwrap();
    let names: Vec<&str> = header.split("  ").map(str::trim).filter(|s| !s.is_empty()).collect();
    assert_eq!(
        names,
        vec!["Index", "Order Date", "Region", "Product Line", "Sales", "Profit"]
    );
    // header, rule, two rows
    assert_eq!(out.lines().count(), 4);
    assert!(out.contains("2023-01-05"));
}

#[test]
fn test_preview_json() {
    let rows = json_of(&["test/sales.csv", "--json", "preview", "--rows", "1"]);
    assert_eq!(rows[0]["Region"], "East");
    assert_eq!(rows[0]["Index"], "0");
}

#[test]
fn test_profile_dimensions() {
    let dims = json_of(&["test/sales.csv", "--json", "profile", "dimensions"]);
    assert_eq!(dims["rows"], 6);
    assert_eq!(dims["columns"], 6);
}

#[test]
fn test_profile_fields() {
    let out = stdout_of(&["test/sales.csv", "profile", "fields"]);
    let order_date = out.lines().find(|l| l.starts_with("Order Date")).unwrap();
    assert!(order_date.contains("datetime"));
    let sales = out.lines().find(|l| l.starts_with("Sales")).unwrap();
    assert!(sales.contains("numeric"));
}

#[test]
fn test_profile_summary_has_null_count_row() {
    let out = stdout_of(&[
        "test/sales.csv",
        "--nulls",
        "preserve",
        "profile",
        "summary",
    ]);
    assert!(out.lines().nth(2).unwrap().starts_with("null count"));
    assert!(out.contains("mean"));
    assert!(out.contains("75%"));
}

#[test]
fn test_value_counts_total_matches_row_count() {
    let result = json_of(&[
        "test/sales.csv",
        "--json",
        "profile",
        "value-counts",
        "--column",
        "Product Line",
    ]);
    let counts = result["counts"].as_array().unwrap();
    let total: u64 = counts.iter().map(|c| c["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 6);
    assert_eq!(counts[0]["value"], "Bikes");
    assert_eq!(counts[0]["count"], 3);
}

#[test]
fn test_value_counts_defaults_to_first_text_column() {
    let result = json_of(&["test/sales.csv", "--json", "profile", "value-counts"]);
    assert_eq!(result["column"], "Region");
}

#[test]
fn test_value_counts_without_text_columns() {
    let err = stderr_of_failure(&["test/numbers.csv", "profile", "value-counts"]);
    assert!(err.contains("No text columns"));
}

#[test]
fn test_bar_chart_png_to_stdout() {
    let output = run_pivotplot(&[
        "test/sales.csv",
        "chart",
        "bar(value: Sales, op: sum, by: Region)",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(is_valid_png(&output.stdout), "Output is not a valid PNG");
}

#[test]
fn test_bar_chart_json_sorted_descending() {
    let charts = json_of(&[
        "test/sales.csv",
        "--json",
        "chart",
        "bar(value: Sales, op: sum, by: Region)",
    ]);
    let chart = &charts[0];
    assert_eq!(chart["kind"], "bar");
    assert_eq!(chart["title"], "Sum of Sales by Region");
    let rows = chart["pivot"]["rows"].as_array().unwrap();
    let keys: Vec<&str> = rows.iter().map(|r| r["key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["North", "West", "East"]);
    assert_eq!(rows[0]["values"][0], 210.0);
}

#[test]
fn test_bar_chart_truncates_to_twenty() {
    let charts = json_of(&[
        "test/groups.csv",
        "--json",
        "chart",
        "bar(value: sales, op: sum, by: group)",
    ]);
    let rows = charts[0]["pivot"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 20);
    assert_eq!(rows[0]["key"], "g24");
    assert_eq!(rows[19]["key"], "g05");
}

#[test]
fn test_line_chart_year_month_json() {
    let charts = json_of(&[
        "test/sales.csv",
        "--json",
        "chart",
        "line(values: [Sales, Profit], x: \"Order Date\", op: sum, group: year_month)",
    ]);
    let chart = &charts[0];
    assert_eq!(chart["kind"], "line");
    assert_eq!(chart["rotation"], 90);
    assert_eq!(chart["x_range"][0], "2023-01-01");
    assert_eq!(chart["x_range"][1], "2023-03-01");
    let sales: Vec<f64> = chart["pivot"]["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["values"][0].as_f64().unwrap())
        .collect();
    assert_eq!(sales, vec![150.0, 230.0, 130.0]);
}

#[test]
fn test_pipeline_writes_one_file_per_chart() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().to_str().unwrap();
    let out = stdout_of(&[
        "test/sales.csv",
        "chart",
        "bar(value: Sales, op: mean, by: [Region, \"Product Line\"]) | \
         line(values: Sales, x: \"Order Date\", op: count, group: month)",
        "--output-dir",
        out_dir,
    ]);
    assert_eq!(out.lines().count(), 3);

    let mut files: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            "1-mean-of-sales-by-region.png",
            "2-mean-of-sales-by-product-line.png",
            "3-count-of-sales-by-order-date-in-grouping-by-month.png",
        ]
    );
    for file in files {
        let bytes = fs::read(dir.path().join(file)).unwrap();
        assert!(is_valid_png(&bytes));
    }
}

#[test]
fn test_multiple_charts_need_output_dir() {
    let err = stderr_of_failure(&[
        "test/sales.csv",
        "chart",
        "bar(value: Sales, op: sum, by: [Region, \"Product Line\"])",
    ]);
    assert!(err.contains("--output-dir"));
}

#[test]
fn test_svg_output() {
    let out = stdout_of(&[
        "test/sales.csv",
        "--format",
        "svg",
        "chart",
        "line(values: Sales, x: \"Order Date\", op: sum, group: year)",
    ]);
    assert!(out.starts_with("<svg"));
}

#[test]
fn test_year_month_with_null_dates_fails() {
    let err = stderr_of_failure(&[
        "test/sales_null_dates.csv",
        "chart",
        "line(values: Sales, x: \"Order Date\", op: sum, group: year-month)",
    ]);
    assert!(err.contains("cannot bucket: null date/time values present"));
}

#[test]
fn test_year_with_null_dates_succeeds() {
    let charts = json_of(&[
        "test/sales_null_dates.csv",
        "--json",
        "chart",
        "line(values: Sales, x: \"Order Date\", op: sum, group: year)",
    ]);
    let rows = charts[0]["pivot"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["key"], 2023);
    assert_eq!(rows[0]["values"][0], 130.0);
}

#[test]
fn test_sum_of_text_column_fails() {
    let err = stderr_of_failure(&[
        "test/sales.csv",
        "chart",
        "bar(value: Region, op: sum, by: \"Product Line\")",
    ]);
    assert!(err.contains("not numeric"));
}

#[test]
fn test_unknown_column_fails() {
    let err = stderr_of_failure(&[
        "test/sales.csv",
        "chart",
        "bar(value: Revenue, op: sum, by: Region)",
    ]);
    assert!(err.contains("Column 'Revenue' not found"));
}

#[test]
fn test_parse_error() {
    let err = stderr_of_failure(&["test/sales.csv", "chart", "bar(value: Sales"]);
    assert!(err.contains("Parse error"));
}

#[test]
fn test_config_file_sets_top_n_and_format() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("pivotplot.json");
    fs::write(&config_path, r#"{"bar_top_n": 3, "render": {"type": "svg"}}"#).unwrap();
    let config = config_path.to_str().unwrap();

    let charts = json_of(&[
        "test/groups.csv",
        "--config",
        config,
        "--json",
        "chart",
        "bar(value: sales, op: sum, by: group)",
    ]);
    assert_eq!(charts[0]["pivot"]["rows"].as_array().unwrap().len(), 3);

    let out = stdout_of(&[
        "test/groups.csv",
        "--config",
        config,
        "chart",
        "bar(value: sales, op: count, by: group)",
    ]);
    assert!(out.starts_with("<svg"));
}

#[test]
fn test_excel_sheets_and_header_row() {
    let sheets = stdout_of(&["test/orders.xlsx", "sheets"]);
    assert_eq!(sheets.lines().collect::<Vec<_>>(), vec!["Orders", "Notes"]);

    let charts = json_of(&[
        "test/orders.xlsx",
        "--header-row",
        "1",
        "--json",
        "chart",
        "bar(value: Units, op: sum, by: Region)",
    ]);
    let rows = charts[0]["pivot"]["rows"].as_array().unwrap();
    assert_eq!(rows[0]["key"], "West");
    assert_eq!(rows[0]["values"][0], 6.0);
    assert_eq!(rows[1]["key"], "East");
    assert_eq!(rows[1]["values"][0], 5.0);
}

#[test]
fn test_excel_unknown_sheet() {
    let err = stderr_of_failure(&["test/orders.xlsx", "--sheet", "Missing", "preview"]);
    assert!(err.contains("Sheet 'Missing' not found"));
    assert!(err.contains("Orders, Notes"));
}

#[test]
fn test_excel_second_sheet() {
    let out = stdout_of(&["test/orders.xlsx", "--sheet", "Notes", "preview"]);
    assert!(out.starts_with("Index  Note"));
    assert!(out.contains("second"));
}

#[test]
fn test_sheets_on_csv_fails() {
    let err = stderr_of_failure(&["test/sales.csv", "sheets"]);
    assert!(err.contains("not an Excel workbook"));
}
