use super::{Expression, Location};

/// `(a, b) = pair` — binds each element of an aggregate value.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDestructuring {
    pub names: Vec<String>,
    pub value: Expression,
    pub location: Location,
}
