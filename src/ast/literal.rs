use super::{Location, ResolvedType};

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    /// Fixed-width type suffix from the token (e.g. `42s32`, `1.5f64`).
    pub suffix: Option<String>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Integer(i128),
    Decimal(f64),
    Boolean(bool),
    Text(String),
}
