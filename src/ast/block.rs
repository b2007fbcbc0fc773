use super::{Location, Statement};

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub location: Location,
}

impl Block {
    pub fn from_statements(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            location: Location::default(),
        }
    }
}
