// Syntax tree for the chart request language

/// One `name(arg: value, ...)` call before validation
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub value: ArgValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Bare word or quoted string
    Single(String),
    /// `[a, b]`
    List(Vec<String>),
}

impl ArgValue {
    /// A single value is accepted where a list is expected
    pub fn into_list(self) -> Vec<String> {
        match self {
            ArgValue::Single(s) => vec![s],
            ArgValue::List(items) => items,
        }
    }
}

/// Commands joined by `|`
pub type Pipeline = Vec<Command>;
