use super::{Expression, Location, Statement};

/// Numeric-range `for` loop. The semantic analyzer desugars iterator-driven
/// loops into this form before code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub variable: String,
    pub var_type: Option<String>,
    pub start: Expression,
    pub end: Expression,
    pub body: Vec<Statement>,
    pub location: Location,
}
