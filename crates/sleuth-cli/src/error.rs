use thiserror::Error;

use sleuth_core::{ConfigError, SearchError, ValidationError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("search failed: {error}")]
    Search { error: SearchError },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl From<SearchError> for CliError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::Validation(error) => Self::Validation(error),
            error => Self::Search { error },
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::Config(ConfigError::Io(_)) => 10,
            Self::Config(_) => 2,
            Self::Search { .. } => 3,
            Self::Serialization(_) => 4,
        }
    }

    /// Suggestions attached to a failed search, if any.
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Search {
                error: SearchError::RecoveryFailed { suggestions },
            } => suggestions,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        assert_eq!(CliError::from(SearchError::Validation(ValidationError::EmptyValue)).exit_code(), 2);
        assert_eq!(
            CliError::from(SearchError::RecoveryFailed {
                suggestions: vec![String::from("try later")]
            })
            .exit_code(),
            3
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(CliError::from(ConfigError::Io(io)).exit_code(), 10);
    }
}
