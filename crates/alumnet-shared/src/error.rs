use thiserror::Error;

/// User input that fails a precondition. Always raised before any backend
/// call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Message is too long: {len} characters (max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("You need to sign in to do that")]
    NotAuthenticated,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Cannot target yourself")]
    SelfTarget,

    #[error("Role {0} is not allowed to do that")]
    RoleNotAllowed(crate::types::Role),

    #[error("{0}")]
    Invalid(String),
}
