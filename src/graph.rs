use crate::config::{OutputFormat, RenderOptions};
use crate::ir::{ChartKind, ChartSpec};
use crate::table::Value;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;

/// Colours for the second and later line series
const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(23, 190, 207),
];

/// Maximum number of x tick labels on a line chart
const MAX_X_LABELS: usize = 12;

/// Render one resolved chart to PNG or SVG bytes
pub fn render_chart(spec: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    if spec.pivot.rows.is_empty() {
        anyhow::bail!("Cannot render '{}': no groups to plot", spec.title);
    }

    match options.format {
        OutputFormat::Png => render_png(spec, options),
        OutputFormat::Svg => render_svg(spec, options),
    }
}

fn render_png(spec: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root, spec, options)?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

fn render_svg(spec: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw(&root, spec, options)?;
    }
    Ok(svg.into_bytes())
}

/// plotters errors carry the backend error type, which is not always
/// `'static`; flatten them into anyhow with a description.
trait DrawContext<T> {
    fn draw_context(self, what: &str) -> Result<T>;
}

impl<T, E: fmt::Debug> DrawContext<T> for std::result::Result<T, E> {
    fn draw_context(self, what: &str) -> Result<T> {
        self.map_err(|e| anyhow!("{}: {:?}", what, e))
    }
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    options: &RenderOptions,
) -> Result<()> {
    root.fill(&WHITE).draw_context("Failed to fill background")?;

    match spec.kind {
        ChartKind::Bar => draw_bar(root, spec, options)?,
        ChartKind::Line => draw_line(root, spec, options)?,
    }

    root.present().draw_context("Failed to present drawing")?;
    Ok(())
}

/// Horizontal bars: values along x, one category per row, first row on top
fn draw_bar<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    options: &RenderOptions,
) -> Result<()> {
    let categories: Vec<String> = spec.pivot.keys().iter().map(|k| k.to_string()).collect();
    let values: Vec<f64> = spec.pivot.series(0).into_iter().map(|v| v.unwrap_or(0.0)).collect();
    let n = categories.len() as i32;

    let lo = values.iter().cloned().fold(0.0, f64::min);
    let hi = values.iter().cloned().fold(0.0, f64::max);
    let x_range = if lo == hi {
        (lo - 1.0)..(hi + 1.0)
    } else {
        // Room for the value labels past the bar ends
        let padding = (hi - lo) * 0.1;
        (lo - if lo < 0.0 { padding } else { 0.0 })..(hi + padding)
    };

    let label_width = categories.iter().map(|c| c.chars().count()).max().unwrap_or(0) as u32;
    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&spec.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size((label_width * 7 + 30).clamp(50, 250))
        .build_cartesian_2d(x_range, (0..n).into_segmented())
        .draw_context("Failed to build chart")?;

    // Row 0 is drawn at the top, so segment i shows row n - 1 - i
    let row_of = |i: i32| (n - 1 - i) as usize;
    let label_for = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) if *i >= 0 && *i < n => categories[row_of(*i)].clone(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_deref().unwrap_or(""))
        .y_labels(categories.len())
        .y_label_formatter(&label_for)
        .draw()
        .draw_context("Failed to draw mesh")?;

    let color = parse_color(&options.color);
    chart
        .draw_series(values.iter().enumerate().map(|(row, &v)| {
            let i = n - 1 - row as i32;
            let mut bar = Rectangle::new(
                [(0.0, SegmentValue::Exact(i)), (v, SegmentValue::Exact(i + 1))],
                color.filled(),
            );
            bar.set_margin(3, 3, 0, 0);
            bar
        }))
        .draw_context("Failed to draw bars")?;

    let label_style = ("sans-serif", 12).into_font().color(&BLACK);
    chart
        .draw_series(values.iter().enumerate().map(|(row, &v)| {
            let i = n - 1 - row as i32;
            Text::new(format!("{:.0}", v), (v, SegmentValue::CenterOf(i)), label_style.clone())
        }))
        .draw_context("Failed to draw value labels")?;

    Ok(())
}

/// How line-chart keys map onto the numeric x axis
enum KeyAxis {
    Numeric,
    /// Days since the Unix epoch
    Temporal,
    /// Position of each key, for text or boolean groupings
    Categorical(Vec<String>),
}

impl KeyAxis {
    fn for_keys(keys: &[&Value]) -> Self {
        if keys.iter().all(|k| k.as_f64().is_some()) {
            KeyAxis::Numeric
        } else if keys.iter().all(|k| k.as_datetime().is_some()) {
            KeyAxis::Temporal
        } else {
            KeyAxis::Categorical(keys.iter().map(|k| k.to_string()).collect())
        }
    }

    fn position(&self, index: usize, key: &Value) -> f64 {
        match self {
            KeyAxis::Numeric => key.as_f64().unwrap_or(index as f64),
            KeyAxis::Temporal => key
                .as_datetime()
                .map(|dt| dt.and_utc().timestamp() as f64 / 86_400.0)
                .unwrap_or(index as f64),
            KeyAxis::Categorical(_) => index as f64,
        }
    }

    fn label(&self, x: f64) -> String {
        match self {
            KeyAxis::Numeric => {
                if x.fract() == 0.0 {
                    format!("{:.0}", x)
                } else {
                    format!("{:.2}", x)
                }
            }
            KeyAxis::Temporal => {
                let secs = (x * 86_400.0).round() as i64;
                DateTime::<Utc>::from_timestamp(secs, 0)
                    .map(|dt| dt.naive_utc().format("%Y-%m-%d").to_string())
                    .unwrap_or_default()
            }
            KeyAxis::Categorical(names) => {
                let idx = x.round();
                if (x - idx).abs() < 1e-6 && idx >= 0.0 && (idx as usize) < names.len() {
                    names[idx as usize].clone()
                } else {
                    String::new()
                }
            }
        }
    }
}

fn draw_line<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    options: &RenderOptions,
) -> Result<()> {
    let keys = spec.pivot.keys();
    let axis = KeyAxis::for_keys(&keys);
    let xs: Vec<f64> = keys.iter().enumerate().map(|(i, k)| axis.position(i, k)).collect();

    // x spans exactly the first and last key
    let (x_min, x_max) = match &spec.x_range {
        Some((lo, hi)) => (axis.position(0, lo), axis.position(keys.len() - 1, hi)),
        None => (xs[0], xs[xs.len() - 1]),
    };
    let x_range = if x_min == x_max {
        (x_min - 1.0)..(x_max + 1.0)
    } else {
        x_min..x_max
    };

    let series: Vec<Vec<Option<f64>>> =
        (0..spec.series_labels.len()).map(|i| spec.pivot.series(i)).collect();
    let all_y: Vec<f64> = series.iter().flatten().flatten().copied().collect();
    let y_min = all_y.iter().cloned().fold(f64::INFINITY, f64::min);
    let y_max = all_y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let y_range = if y_min == y_max {
        (y_min - 1.0)..(y_max + 1.0)
    } else {
        let padding = (y_max - y_min) * 0.05;
        (y_min - padding)..(y_max + padding)
    };

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&spec.title, ("sans-serif", 20))
        .x_label_area_size(if spec.rotation == 90 { 90 } else { 40 })
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .draw_context("Failed to build chart")?;

    let mut x_label_style = ("sans-serif", 12).into_font();
    if spec.rotation == 90 {
        x_label_style = x_label_style.transform(FontTransform::Rotate90);
    }
    let tick_label = |x: &f64| axis.label(*x);

    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .x_labels(keys.len().min(MAX_X_LABELS))
        .x_label_style(x_label_style)
        .x_label_formatter(&tick_label)
        .draw()
        .draw_context("Failed to draw mesh")?;

    let primary = parse_color(&options.color);
    for (idx, (label, values)) in spec.series_labels.iter().zip(&series).enumerate() {
        let color = if idx == 0 {
            primary
        } else {
            PALETTE[(idx - 1) % PALETTE.len()]
        };
        let points: Vec<(f64, f64)> = xs
            .iter()
            .zip(values)
            .filter_map(|(&x, v)| v.map(|y| (x, y)))
            .collect();

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
            .draw_context("Failed to draw line")?
            .label(label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

        chart
            .draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))
            .draw_context("Failed to draw points")?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .draw_context("Failed to draw legend")?;

    Ok(())
}

/// Parse a colour name or `#rrggbb`; unknown values fall back to red
fn parse_color(color: &str) -> RGBColor {
    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() == 6 {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            if let (Some(r), Some(g), Some(b)) = (channel(0), channel(2), channel(4)) {
                return RGBColor(r, g, b);
            }
        }
    }

    match color.to_ascii_lowercase().as_str() {
        "green" => GREEN,
        "blue" => BLUE,
        "black" => BLACK,
        "yellow" => YELLOW,
        "cyan" => CYAN,
        "magenta" => MAGENTA,
        "white" => WHITE,
        _ => RED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{pivot, top_groups, AggOp, PivotRequest};
    use crate::ir::ChartKind;
    use crate::table::{Column, Table};
    use chrono::NaiveDate;

    fn bar_spec() -> ChartSpec {
        let text = |s: &str| Value::Text(s.to_string());
        let table = Table::new(vec![
            Column::new("Region", vec![text("A"), text("A"), text("B")]),
            Column::new("Sales", vec![Value::Int(10), Value::Int(20), Value::Int(5)]),
        ])
        .unwrap();
        ChartSpec {
            kind: ChartKind::Bar,
            title: "Sum of Sales by Region".to_string(),
            x_label: "Sales".to_string(),
            y_label: Some("Region".to_string()),
            series_labels: vec!["Sales".to_string()],
            rotation: 0,
            x_range: None,
            pivot: top_groups(&table, "Region", "Sales", AggOp::Sum, 20).unwrap(),
        }
    }

    fn line_spec() -> ChartSpec {
        let date = |m: u32| {
            Value::DateTime(NaiveDate::from_ymd_opt(2023, m, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
        };
        let table = Table::new(vec![
            Column::new("Order Date", vec![date(1), date(2), date(3)]),
            Column::new("Sales", vec![Value::Int(3), Value::Int(7), Value::Int(4)]),
            Column::new("Profit", vec![Value::Int(1), Value::Int(2), Value::Int(1)]),
        ])
        .unwrap();
        let result = pivot(
            &table,
            &PivotRequest {
                group_by: "Order Date".to_string(),
                values: vec!["Sales".to_string(), "Profit".to_string()],
                op: AggOp::Sum,
            },
        )
        .unwrap();
        ChartSpec {
            kind: ChartKind::Line,
            title: "Sum of Sales, Profit by Order Date in grouping by Year-Month".to_string(),
            x_label: "Order Date".to_string(),
            y_label: None,
            series_labels: vec!["Sales".to_string(), "Profit".to_string()],
            rotation: 90,
            x_range: result.key_range(),
            pivot: result,
        }
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("red"), RED);
        assert_eq!(parse_color("Blue"), BLUE);
        assert_eq!(parse_color("#102030"), RGBColor(16, 32, 48));
        assert_eq!(parse_color("#zz"), RED);
        assert_eq!(parse_color("unknown"), RED);
    }

    #[test]
    fn test_key_axis_labels() {
        let d = Value::DateTime(NaiveDate::from_ymd_opt(2023, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());
        let keys = vec![&d];
        let axis = KeyAxis::for_keys(&keys);
        let x = axis.position(0, &d);
        assert_eq!(axis.label(x), "2023-03-01");

        let a = Value::Text("a".to_string());
        let b = Value::Text("b".to_string());
        let axis = KeyAxis::for_keys(&[&a, &b]);
        assert_eq!(axis.label(1.0), "b");
        assert_eq!(axis.label(0.5), "");

        let y = Value::Int(2021);
        let axis = KeyAxis::for_keys(&[&y]);
        assert_eq!(axis.label(axis.position(0, &y)), "2021");
    }

    #[test]
    fn test_render_bar_png() {
        let bytes = render_chart(&bar_spec(), &RenderOptions::default()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_render_line_svg() {
        let options = RenderOptions {
            format: OutputFormat::Svg,
            ..RenderOptions::default()
        };
        let bytes = render_chart(&line_spec(), &options).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn test_render_empty_chart_fails() {
        let mut spec = bar_spec();
        spec.pivot.rows.clear();
        let err = render_chart(&spec, &RenderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no groups"));
    }
}
