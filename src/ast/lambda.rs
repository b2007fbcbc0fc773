use super::{Location, Param, ResolvedType, Statement};

/// An anonymous function. Capture of enclosing bindings is resolved by the
/// semantic analyzer; the code generator only sees the parameter list and
/// body.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: Box<Statement>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
