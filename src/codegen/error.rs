use thiserror::Error;

use crate::ast::Location;

/// Result of lowering a node to IR.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Fatal code generation errors. All of them abort emission of the current
/// module; the caller must discard any partial output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("could not resolve type '{type_name}' while {context} ({location})")]
    TypeResolutionFailed {
        type_name: String,
        context: String,
        location: Location,
    },

    #[error("not implemented: {what} ({location})")]
    NotImplemented { what: String, location: Location },

    #[error("invalid operation: {message} ({location})")]
    InvalidOperation { message: String, location: Location },
}

impl CodegenError {
    pub fn unresolved(
        type_name: impl ToString,
        context: impl ToString,
        location: &Location,
    ) -> Self {
        CodegenError::TypeResolutionFailed {
            type_name: type_name.to_string(),
            context: context.to_string(),
            location: location.to_owned(),
        }
    }

    pub fn not_implemented(what: impl ToString, location: &Location) -> Self {
        CodegenError::NotImplemented {
            what: what.to_string(),
            location: location.to_owned(),
        }
    }

    pub fn invalid(message: impl ToString, location: &Location) -> Self {
        CodegenError::InvalidOperation {
            message: message.to_string(),
            location: location.to_owned(),
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            CodegenError::TypeResolutionFailed { location, .. }
            | CodegenError::NotImplemented { location, .. }
            | CodegenError::InvalidOperation { location, .. } => location,
        }
    }
}
