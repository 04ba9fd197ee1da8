use crate::aggregate::BAR_TOP_N;
use crate::normalize::NullPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
    /// Primary series colour, a name or `#rrggbb`
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_color() -> String { "red".to_string() }
fn default_top_n() -> usize { BAR_TOP_N }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: OutputFormat::Png,
            color: default_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub null_policy: NullPolicy,
    #[serde(default = "default_top_n")]
    pub bar_top_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            null_policy: NullPolicy::default(),
            bar_top_n: default_top_n(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid config JSON")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }
}
