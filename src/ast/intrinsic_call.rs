use super::{Expression, Location, ResolvedType};

/// A compiler pseudo-operation (`@intrinsic.add<s32>(a, b)`). The name is
/// stored without the `@intrinsic.` prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrinsicCall {
    pub name: String,
    pub type_args: Vec<String>,
    pub args: Vec<Expression>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}

/// A raw memory access primitive, only legal inside `danger` blocks. Routed
/// through the same lowering as the memory intrinsic group.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryOperation {
    pub op: String,
    pub type_arg: String,
    pub args: Vec<Expression>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
