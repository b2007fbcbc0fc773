use super::{Block, Expression, Location, ResolvedType};

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Expression,
    pub then_block: Block,
    pub else_block: Option<Block>,
    pub location: Location,
}

/// `if` in value position. Both branches are required and each yields the
/// value of its trailing expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Box<Expression>,
    pub then_block: Block,
    pub else_block: Option<Block>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
