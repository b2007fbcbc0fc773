use super::{Expression, Location, ResolvedType};

/// Call of a method or generic function, possibly with explicit type
/// arguments (`foo<s64>(x)`, `list.push(v)`, `Celsius.from(v)`).
#[derive(Debug, Clone, PartialEq)]
pub struct GenericMethodCall {
    /// Receiver expression; `None` for free-standing calls.
    pub target: Option<Box<Expression>>,
    pub method: String,
    pub type_args: Vec<String>,
    pub args: Vec<Expression>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
