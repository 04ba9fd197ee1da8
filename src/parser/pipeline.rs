// Pipeline parser: command | command | ...

use super::ast::Pipeline;
use super::command::parse_command;
use super::lexer::ws;
use nom::{
    character::complete::char,
    combinator::eof,
    multi::separated_list1,
    IResult,
};

/// Parse a complete request string
pub fn parse_pipeline(input: &str) -> IResult<&str, Pipeline> {
    let (input, commands) = separated_list1(ws(char('|')), parse_command)(input)?;

    // Consume trailing whitespace and ensure end of input
    let (input, _) = ws(eof)(input)?;

    Ok((input, commands))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_command() {
        let (_, pipeline) = parse_pipeline("bar(value: Sales, op: sum, by: Region)").unwrap();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline[0].name, "bar");
    }

    #[test]
    fn test_two_commands() {
        let input = "bar(value: Sales, op: sum, by: Region) |\n line(values: Sales, x: Date, op: sum)";
        let (rest, pipeline) = parse_pipeline(input).unwrap();
        assert_eq!(rest, "");
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline[1].name, "line");
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(parse_pipeline("bar(value: Sales, op: sum, by: Region) extra").is_err());
        assert!(parse_pipeline("bar(value: Sales, op: sum, by: Region) |").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_pipeline("").is_err());
        assert!(parse_pipeline("   ").is_err());
    }
}
