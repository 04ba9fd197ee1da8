// Chart request language parser

pub mod ast;
pub mod command;
pub mod lexer;
pub mod pipeline;

use crate::error::{EdaError, Result};
use crate::ir::ChartRequest;

// Public API re-exports
pub use ast::{Command, Pipeline};
pub use pipeline::parse_pipeline;

/// Parse and validate a full request string
pub fn parse_chart_requests(input: &str) -> Result<Vec<ChartRequest>> {
    let commands = match parse_pipeline(input) {
        Ok((_, commands)) => commands,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(EdaError::Parse(describe_position(input, e.input)))
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(EdaError::Parse("incomplete chart request".to_string()))
        }
    };
    commands.into_iter().map(command::build_request).collect()
}

fn describe_position(input: &str, remaining: &str) -> String {
    let offset = input.len() - remaining.len();
    let snippet: String = remaining.trim_start().chars().take(20).collect();
    if snippet.is_empty() {
        format!("unexpected end of chart request at offset {}", offset)
    } else {
        format!("unexpected input at offset {}: '{}'", offset, snippet)
    }
}
