use super::{Expression, Location};

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub value: Option<Expression>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Break {
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Continue {
    pub location: Location,
}
