use super::{Location, Statement};

/// A delimited region permitting raw memory intrinsics. The lowerer treats it
/// as a transparent pass-through with marker comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Danger {
    pub body: Vec<Statement>,
    pub location: Location,
}
