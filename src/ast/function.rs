use super::{Location, Param, Statement};

/// A function definition. Methods arrive with a dotted name
/// (`Celsius.to_fahrenheit`) and, for instance methods, an explicit leading
/// `self` parameter inserted by the semantic analyzer. A non-empty
/// `type_params` list marks a generic template that is only lowered on
/// instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    /// `None` for void functions.
    pub return_type: Option<String>,
    pub body: Vec<Statement>,
    pub location: Location,
}
