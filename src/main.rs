use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use pivotplot::config::{Config, OutputFormat};
use pivotplot::data::DataGrid;
use pivotplot::error::EdaError;
use pivotplot::graph::render_chart;
use pivotplot::loader::{self, FileType, LoadCache, LoadKey, LoadOptions};
use pivotplot::normalize::{normalize, NullPolicy};
use pivotplot::parser::parse_chart_requests;
use pivotplot::profile::{self, ProfileRequest};
use pivotplot::resolve::resolve_charts;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "pivotplot")]
#[command(about = "Profile, pivot and chart CSV or Excel data", long_about = None)]
struct Args {
    /// Input file; `-` reads stdin
    file: PathBuf,

    /// Input format; guessed from the extension when omitted
    #[arg(long, value_enum)]
    file_type: Option<FileType>,

    /// Worksheet to read (Excel only); defaults to the first sheet
    #[arg(long)]
    sheet: Option<String>,

    /// Zero-based row holding the column names
    #[arg(long, default_value_t = 0)]
    header_row: usize,

    /// Null handling for text columns
    #[arg(long, value_enum)]
    nulls: Option<NullPolicy>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    /// Image format for charts
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List worksheet names of a workbook
    Sheets,
    /// Show the first rows of the normalized table
    Preview {
        #[arg(long, default_value_t = 20)]
        rows: usize,
    },
    /// Describe the table
    Profile {
        #[arg(value_enum)]
        mode: ProfileMode,
        /// Column for value-counts; the first text column when omitted
        #[arg(long)]
        column: Option<String>,
    },
    /// Render charts, e.g. 'bar(value: Sales, op: sum, by: Region)'
    Chart {
        request: String,
        /// Directory for chart files; required for more than one chart
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileMode {
    Fields,
    Summary,
    ValueCounts,
    Dimensions,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if let Some(nulls) = args.nulls {
        config.null_policy = nulls;
    }
    if let Some(format) = args.format {
        config.render.format = format;
    }
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }

    let file_type = args
        .file_type
        .unwrap_or_else(|| FileType::from_path(&args.file));

    if let Commands::Sheets = args.command {
        if file_type != FileType::Excel {
            anyhow::bail!("'{}' is not an Excel workbook", args.file.display());
        }
        let bytes = read_input(&args.file)
            .with_context(|| format!("Failed to read {}", args.file.display()))?;
        let names = loader::sheet_names(&bytes).context("Failed to open workbook")?;
        if args.json {
            return print_text(&serde_json::to_string_pretty(&names)?);
        }
        return print_text(&names.join("\n"));
    }

    let key = LoadKey {
        source: args.file.display().to_string(),
        options: LoadOptions {
            file_type,
            sheet: args.sheet.clone(),
            header_row: args.header_row,
        },
    };
    let mut cache = LoadCache::new();
    let raw = cache
        .get_or_load(key, || read_input(&args.file))
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let table = normalize(&raw, config.null_policy);

    match args.command {
        Commands::Sheets => Ok(()),
        Commands::Preview { rows } => print_grid(&table.head(rows).to_grid(), args.json),
        Commands::Profile { mode, column } => {
            let request = match mode {
                ProfileMode::Fields => ProfileRequest::FieldDescriptions,
                ProfileMode::Summary => ProfileRequest::SummaryStatistics,
                ProfileMode::Dimensions => ProfileRequest::DataDimensions,
                ProfileMode::ValueCounts => {
                    let column = match column {
                        Some(c) => c,
                        None => profile::text_columns(&table)
                            .first()
                            .map(|c| c.to_string())
                            .ok_or(EdaError::NoTextColumns)?,
                    };
                    ProfileRequest::ValueCounts { column }
                }
            };
            let result = profile::profile(&table, &request)?;
            if args.json {
                print_text(&serde_json::to_string_pretty(&result)?)
            } else {
                print_grid(&result.to_grid(), false)
            }
        }
        Commands::Chart {
            request,
            output_dir,
        } => {
            let requests = parse_chart_requests(&request)?;
            let charts = resolve_charts(&table, &requests, config.bar_top_n)?;
            if args.json {
                return print_text(&serde_json::to_string_pretty(&charts)?);
            }

            // Render everything before writing anything
            let images = charts
                .iter()
                .map(|chart| {
                    render_chart(chart, &config.render)
                        .with_context(|| format!("Failed to render '{}'", chart.title))
                })
                .collect::<Result<Vec<_>>>()?;

            match output_dir {
                None if images.len() == 1 => write_stdout(&images[0]),
                None => anyhow::bail!(
                    "request produced {} charts; pass --output-dir to write them",
                    images.len()
                ),
                Some(dir) => {
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("Failed to create {}", dir.display()))?;
                    let ext = config.render.format.extension();
                    for (i, (chart, bytes)) in charts.iter().zip(&images).enumerate() {
                        let path = dir.join(format!("{}-{}.{}", i + 1, chart.slug(), ext));
                        std::fs::write(&path, bytes)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("{}", path.display());
                    }
                    info!("wrote {} charts to {}", images.len(), dir.display());
                    Ok(())
                }
            }
        }
    }
}

fn read_input(path: &Path) -> pivotplot::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        io::stdin().lock().read_to_end(&mut bytes)?;
        return Ok(bytes);
    }
    Ok(std::fs::read(path)?)
}

fn print_grid(grid: &DataGrid, json: bool) -> Result<()> {
    if json {
        print_text(&serde_json::to_string_pretty(&grid.to_json())?)
    } else {
        print_text(&grid.to_string())
    }
}

fn print_text(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text.trim_end_matches('\n')).context("Failed to write to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(bytes)
        .context("Failed to write image to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
