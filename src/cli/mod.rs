//! The command line client.

pub mod options;
pub mod report;

use std::fmt;

use crate::commons::error::{Error, ErrorResponse, IoError};
use crate::config::ConfigError;

use self::report::ReportFormat;


//------------ CliError ------------------------------------------------------

/// Everything that can keep a command from producing its report.
#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Io(IoError),
    Service(Error),
    Json(serde_json::Error),
}

impl CliError {
    /// Renders the error for the user.
    ///
    /// Errors of the service are shown as error responses.
    pub fn render(&self, format: ReportFormat) -> String {
        let response = match self {
            CliError::Service(err) => err.to_error_response(),
            other => ErrorResponse::new("cli-error", other),
        };
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(&response)
                .unwrap_or_else(|_| response.to_string()),
            ReportFormat::Pem => response.to_string(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Io(e) => e.fmt(f),
            CliError::Service(e) => e.fmt(f),
            CliError::Json(e) => write!(f, "Cannot render report: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<IoError> for CliError {
    fn from(e: IoError) -> Self {
        CliError::Io(e)
    }
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Service(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}
