//! CLI error type.

use std::fmt;

use terrain_pyramid::PyramidError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid arguments or configuration.
    Config(String),
    /// The library failed.
    Pyramid(PyramidError),
}

impl CliError {
    /// Process exit code: 2 for configuration problems, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => 2,
            CliError::Pyramid(e) if e.is_config_error() => 2,
            CliError::Pyramid(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::Pyramid(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::Pyramid(e) => Some(e),
        }
    }
}

impl From<PyramidError> for CliError {
    fn from(err: PyramidError) -> Self {
        CliError::Pyramid(err)
    }
}
