use super::{Expression, Location, Statement};

/// Body of `viewing` / `hijacking` / `inspecting` / `seizing`. The statement
/// kind decides the aliasing or locking semantics; the node shape is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedAccess {
    pub source: Expression,
    pub handle: String,
    pub body: Vec<Statement>,
    pub location: Location,
}
