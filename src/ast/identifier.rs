use super::{Location, ResolvedType};

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub location: Location,
    pub info: Option<ResolvedType>,
}
