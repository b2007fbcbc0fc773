use super::{Expression, Location};

/// Assignment to an L-value (identifier or member access).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expression,
    pub value: Expression,
    pub location: Location,
}
