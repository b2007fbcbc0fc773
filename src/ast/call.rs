use super::{Expression, Location, ResolvedType};

/// Direct call of a function known by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: String,
    pub args: Vec<Expression>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
