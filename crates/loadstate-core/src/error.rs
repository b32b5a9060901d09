//! Error types for loadstate

use thiserror::Error;

use crate::AreaId;

/// Core loadstate errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadingError {
    // Naming errors
    #[error("Loading area \"{0}\" already exists")]
    DuplicateName(String),

    #[error("Loading area \"{0}\" not found")]
    NotFound(String),

    #[error("Invalid area name \"{0}\": names must be non-empty and contain no '/'")]
    InvalidName(String),

    // Tree errors
    #[error("Unknown area: {0}")]
    UnknownArea(AreaId),

    #[error("Area {0} is a segment; remove it through its parent")]
    NotARoot(AreaId),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Service errors
    #[error("Loading service stopped")]
    ServiceStopped,
}

/// Result type for loadstate operations
pub type LoadingResult<T> = Result<T, LoadingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_area() {
        let dup = LoadingError::DuplicateName("checkout".into());
        assert_eq!(dup.to_string(), "Loading area \"checkout\" already exists");

        let missing = LoadingError::NotFound("sidebar".into());
        assert_eq!(missing.to_string(), "Loading area \"sidebar\" not found");

        let unknown = LoadingError::UnknownArea(AreaId::new(3));
        assert_eq!(unknown.to_string(), "Unknown area: area#3");
    }
}
