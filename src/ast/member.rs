use super::{Expression, Location, ResolvedType};

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub object: Box<Expression>,
    pub field: String,
    pub location: Location,
    pub info: Option<ResolvedType>,
}

/// Member access on a value of generic record type (`pair.first` where
/// `pair: Pair<s64, bool>`).
#[derive(Debug, Clone, PartialEq)]
pub struct GenericMember {
    pub object: Box<Expression>,
    pub field: String,
    pub type_args: Vec<String>,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
