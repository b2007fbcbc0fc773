use super::{
    BinaryExpr, Call, Conditional, GenericMember, GenericMethodCall, Identifier, IntrinsicCall,
    Lambda, Literal, Location, Member, MemoryOperation, NativeCall, ResolvedType, TypeConversion,
    TypeExpression, UnaryExpr,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Identifier(Identifier),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(Call),
    GenericMethodCall(GenericMethodCall),
    Member(Member),
    GenericMember(GenericMember),
    TypeConversion(TypeConversion),
    Conditional(Conditional),
    Lambda(Lambda),
    IntrinsicCall(IntrinsicCall),
    NativeCall(NativeCall),
    MemoryOperation(MemoryOperation),
    TypeExpression(TypeExpression),
}

impl Expression {
    pub fn location(&self) -> Location {
        match self {
            Expression::Literal(Literal { location, .. })
            | Expression::Identifier(Identifier { location, .. })
            | Expression::Binary(BinaryExpr { location, .. })
            | Expression::Unary(UnaryExpr { location, .. })
            | Expression::Call(Call { location, .. })
            | Expression::GenericMethodCall(GenericMethodCall { location, .. })
            | Expression::Member(Member { location, .. })
            | Expression::GenericMember(GenericMember { location, .. })
            | Expression::TypeConversion(TypeConversion { location, .. })
            | Expression::Conditional(Conditional { location, .. })
            | Expression::Lambda(Lambda { location, .. })
            | Expression::IntrinsicCall(IntrinsicCall { location, .. })
            | Expression::NativeCall(NativeCall { location, .. })
            | Expression::MemoryOperation(MemoryOperation { location, .. })
            | Expression::TypeExpression(TypeExpression { location, .. }) => location.to_owned(),
        }
    }

    pub fn info(&self) -> Option<&ResolvedType> {
        match self {
            Expression::Literal(Literal { info, .. })
            | Expression::Identifier(Identifier { info, .. })
            | Expression::Binary(BinaryExpr { info, .. })
            | Expression::Unary(UnaryExpr { info, .. })
            | Expression::Call(Call { info, .. })
            | Expression::GenericMethodCall(GenericMethodCall { info, .. })
            | Expression::Member(Member { info, .. })
            | Expression::GenericMember(GenericMember { info, .. })
            | Expression::TypeConversion(TypeConversion { info, .. })
            | Expression::Conditional(Conditional { info, .. })
            | Expression::Lambda(Lambda { info, .. })
            | Expression::IntrinsicCall(IntrinsicCall { info, .. })
            | Expression::NativeCall(NativeCall { info, .. })
            | Expression::MemoryOperation(MemoryOperation { info, .. })
            | Expression::TypeExpression(TypeExpression { info, .. }) => info.as_ref(),
        }
    }
}
