use super::{Expression, Location};

/// A variable declaration with initializer (`var x: s32 = 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub declared_type: Option<String>,
    pub value: Expression,
    pub location: Location,
}
