use super::{Expression, Location, ResolvedType};

/// An explicit conversion (`x as f32`).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeConversion {
    pub value: Box<Expression>,
    pub target: String,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
