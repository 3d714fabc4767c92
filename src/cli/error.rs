//! CLI-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) => exitcode::USAGE,
            CliError::Application(e) => match e {
                ApplicationError::SessionNotFound(_) => exitcode::NOINPUT,
                ApplicationError::SessionExists(_) => exitcode::CANTCREAT,
                ApplicationError::Persist(_)
                | ApplicationError::InvalidScript { .. }
                | ApplicationError::Domain(_) => exitcode::DATAERR,
                ApplicationError::Config { .. } => exitcode::CONFIG,
                ApplicationError::OperationFailed { .. } => exitcode::IOERR,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn given_missing_session_when_mapping_exit_code_then_noinput() {
        let err = CliError::from(ApplicationError::SessionNotFound(PathBuf::from("x.sav")));
        assert_eq!(err.exit_code(), exitcode::NOINPUT);
    }

    #[test]
    fn given_invalid_args_when_mapping_exit_code_then_usage() {
        assert_eq!(CliError::InvalidArgs("n".into()).exit_code(), exitcode::USAGE);
    }
}
