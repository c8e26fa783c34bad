//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::from(ApplicationError::Domain(e))
    }
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => exitcode::IOERR,
                InfraError::Snapshot { .. } => exitcode::DATAERR,
                InfraError::Application(ApplicationError::Config { .. }) => exitcode::CONFIG,
                InfraError::Application(ApplicationError::OperationFailed { .. }) => {
                    exitcode::SOFTWARE
                }
                InfraError::Application(ApplicationError::Domain(d)) => domain_exit_code(d),
            },
        }
    }
}

fn domain_exit_code(e: &DomainError) -> i32 {
    match e {
        DomainError::NotFound { .. } => exitcode::NOINPUT,
        DomainError::Unauthorized { .. } => exitcode::NOPERM,
        DomainError::Busy(_) | DomainError::GenerationFailed(_) => exitcode::UNAVAILABLE,
        DomainError::InvalidInput(_) => exitcode::DATAERR,
        DomainError::InvalidState(_) => exitcode::SOFTWARE,
    }
}
