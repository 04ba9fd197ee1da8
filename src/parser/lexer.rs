// Token-level parsers shared by the request language

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, recognize},
    multi::separated_list1,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it ignores surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Bare word: a letter or underscore, then letters, digits, `_`, `-` or `.`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')),
        )),
        String::from,
    )(input)
}

/// Double-quoted text, no escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        String::from,
    )(input)
}

/// A field name: quoted (may contain spaces) or bare
pub fn field(input: &str) -> IResult<&str, String> {
    alt((string_literal, identifier))(input)
}

/// `[a, "b c"]`
pub fn field_list(input: &str) -> IResult<&str, Vec<String>> {
    delimited(
        ws(char('[')),
        separated_list1(ws(char(',')), ws(field)),
        ws(char(']')),
    )(input)
}

/// Argument name directly before a colon
pub fn arg_name(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || c == '_'),
        String::from,
    )(input)
}
