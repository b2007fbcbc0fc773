use super::{Location, ResolvedType};

/// A type used in expression position, e.g. the callee of a static method
/// call.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpression {
    pub name: String,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
