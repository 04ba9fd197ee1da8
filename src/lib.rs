// Library exports for pivotplot

pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod loader;
pub mod parser;
pub mod table;

// Analysis pipeline
pub mod aggregate;
pub mod bucket;
pub mod ir;
pub mod normalize;
pub mod profile;
pub mod resolve;

pub use config::{Config, OutputFormat, RenderOptions};
pub use error::{EdaError, Result};
pub use table::{Column, FieldType, Table, Value};
