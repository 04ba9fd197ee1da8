// Chart command parser and argument validation

use super::ast::{Arg, ArgValue, Command};
use super::lexer::{arg_name, field, field_list, identifier, ws};
use crate::aggregate::AggOp;
use crate::bucket::Bucketing;
use crate::error::{EdaError, Result};
use crate::ir::{BarRequest, ChartRequest, LineRequest};
use nom::{
    branch::alt,
    character::complete::char,
    combinator::map,
    multi::separated_list0,
    IResult,
};

/// Parse one command
/// Format: name(arg: value, arg: [v1, v2], ...)
pub fn parse_command(input: &str) -> IResult<&str, Command> {
    let (input, name) = ws(identifier)(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, args) = separated_list0(ws(char(',')), parse_arg)(input)?;
    let (input, _) = ws(char(')'))(input)?;

    Ok((input, Command { name, args }))
}

fn parse_arg(input: &str) -> IResult<&str, Arg> {
    let (input, name) = ws(arg_name)(input)?;
    let (input, _) = ws(char(':'))(input)?;
    let (input, value) = alt((
        map(field_list, ArgValue::List),
        map(ws(field), ArgValue::Single),
    ))(input)?;

    Ok((input, Arg { name, value }))
}

/// Turn a parsed command into a typed chart request
pub fn build_request(command: Command) -> Result<ChartRequest> {
    let kind = command.name.to_ascii_lowercase();
    let mut args = ArgSet::new(command)?;

    let request = match kind.as_str() {
        "bar" => ChartRequest::Bar(BarRequest {
            value: args.single("value")?,
            op: parse_op(&args.single("op")?)?,
            compare_by: args.list("by")?,
        }),
        "line" => ChartRequest::Line(LineRequest {
            values: args.list("values")?,
            x: args.single("x")?,
            op: parse_op(&args.single("op")?)?,
            bucketing: match args.take("group") {
                Some(value) => parse_bucketing(&args.expect_single("group", value)?)?,
                None => Bucketing::None,
            },
        }),
        other => {
            return Err(EdaError::Parse(format!(
                "unknown chart type '{}', expected bar or line",
                other
            )))
        }
    };

    args.finish()?;
    Ok(request)
}

fn parse_op(s: &str) -> Result<AggOp> {
    match s.to_ascii_lowercase().as_str() {
        "count" => Ok(AggOp::Count),
        "sum" => Ok(AggOp::Sum),
        "mean" => Ok(AggOp::Mean),
        _ => Err(EdaError::Parse(format!(
            "unknown operator '{}', expected count, sum or mean",
            s
        ))),
    }
}

fn parse_bucketing(s: &str) -> Result<Bucketing> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(Bucketing::None),
        "year" => Ok(Bucketing::Year),
        "month" => Ok(Bucketing::Month),
        "year_month" | "year-month" => Ok(Bucketing::YearMonth),
        _ => Err(EdaError::Parse(format!(
            "unknown grouping '{}', expected none, year, month or year_month",
            s
        ))),
    }
}

/// Named arguments of one command, consumed as they are read
struct ArgSet {
    command: String,
    args: Vec<Arg>,
}

impl ArgSet {
    fn new(command: Command) -> Result<Self> {
        for (i, arg) in command.args.iter().enumerate() {
            if command.args[..i].iter().any(|a| a.name == arg.name) {
                return Err(EdaError::Parse(format!(
                    "argument '{}' given more than once in {}()",
                    arg.name, command.name
                )));
            }
        }
        Ok(Self {
            command: command.name,
            args: command.args,
        })
    }

    fn take(&mut self, name: &str) -> Option<ArgValue> {
        let pos = self.args.iter().position(|a| a.name == name)?;
        Some(self.args.remove(pos).value)
    }

    fn required(&mut self, name: &str) -> Result<ArgValue> {
        self.take(name).ok_or_else(|| {
            EdaError::Parse(format!(
                "{}() is missing required argument '{}'",
                self.command, name
            ))
        })
    }

    fn single(&mut self, name: &str) -> Result<String> {
        let value = self.required(name)?;
        self.expect_single(name, value)
    }

    fn expect_single(&self, name: &str, value: ArgValue) -> Result<String> {
        match value {
            ArgValue::Single(s) => Ok(s),
            ArgValue::List(_) => Err(EdaError::Parse(format!(
                "argument '{}' of {}() takes a single value",
                name, self.command
            ))),
        }
    }

    fn list(&mut self, name: &str) -> Result<Vec<String>> {
        Ok(self.required(name)?.into_list())
    }

    /// Anything left over was not recognised
    fn finish(self) -> Result<()> {
        match self.args.first() {
            Some(arg) => Err(EdaError::Parse(format!(
                "unknown argument '{}' for {}()",
                arg.name, self.command
            ))),
            None => Ok(()),
        }
    }
}
