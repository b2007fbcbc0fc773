use super::{
    Assignment, Block, Break, Continue, Danger, Declaration, Expression, ForLoop, If, Location,
    Return, ScopedAccess, TupleDestructuring, WhileLoop,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    If(If),
    While(WhileLoop),
    For(ForLoop),
    Return(Return),
    Break(Break),
    Continue(Continue),
    Block(Block),
    Declaration(Declaration),
    Assignment(Assignment),
    Expression(ExpressionStatement),
    TupleDestructuring(TupleDestructuring),
    Viewing(ScopedAccess),
    Hijacking(ScopedAccess),
    Inspecting(ScopedAccess),
    Seizing(ScopedAccess),
    Danger(Danger),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub location: Location,
}

impl Statement {
    pub fn location(&self) -> Location {
        match self {
            Statement::If(If { location, .. })
            | Statement::While(WhileLoop { location, .. })
            | Statement::For(ForLoop { location, .. })
            | Statement::Return(Return { location, .. })
            | Statement::Break(Break { location })
            | Statement::Continue(Continue { location })
            | Statement::Block(Block { location, .. })
            | Statement::Declaration(Declaration { location, .. })
            | Statement::Assignment(Assignment { location, .. })
            | Statement::Expression(ExpressionStatement { location, .. })
            | Statement::TupleDestructuring(TupleDestructuring { location, .. })
            | Statement::Viewing(ScopedAccess { location, .. })
            | Statement::Hijacking(ScopedAccess { location, .. })
            | Statement::Inspecting(ScopedAccess { location, .. })
            | Statement::Seizing(ScopedAccess { location, .. })
            | Statement::Danger(Danger { location, .. }) => location.to_owned(),
        }
    }
}
