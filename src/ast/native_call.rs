use super::{Expression, Location, ResolvedType};

/// Call of an external C symbol (`native printf(fmt, n)`).
#[derive(Debug, Clone, PartialEq)]
pub struct NativeCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
