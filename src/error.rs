//! Error types for the metadata driver framework.

use std::time::Duration;

use thiserror::Error;

use crate::templating::TemplateError;

/// Errors raised while registering, configuring, or running drivers.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A driver with this internal name was registered twice.
    #[error("Driver already registered: {0}")]
    DuplicateDriver(String),

    /// No driver is registered under this internal name.
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// A driver argument is missing, unknown, or has the wrong type.
    #[error("Invalid argument '{argument}' for driver {driver}: {reason}")]
    InvalidDriverArguments {
        driver: String,
        argument: String,
        reason: String,
    },

    /// Credential or configuration integrity problem.
    #[error("Driver {driver} is misconfigured: {reason}")]
    DriverConfiguration { driver: String, reason: String },

    /// An argument template could not be rendered.
    #[error("Failed to render argument '{argument}' for driver {driver} (document file {document_file}): {source}")]
    TemplateRender {
        driver: String,
        argument: String,
        document_file: String,
        #[source]
        source: TemplateError,
    },

    /// The external analysis service call failed.
    #[error("Driver {driver} failed on document file {document_file}: {kind}")]
    DriverProcessing {
        driver: String,
        document_file: String,
        kind: ProcessingFailure,
    },

    /// Configuration file could not be loaded.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    pub fn invalid_argument(
        driver: &str,
        argument: &str,
        reason: impl Into<String>,
    ) -> Self {
        MetadataError::InvalidDriverArguments {
            driver: driver.to_string(),
            argument: argument.to_string(),
            reason: reason.into(),
        }
    }

    pub fn configuration(driver: &str, reason: impl Into<String>) -> Self {
        MetadataError::DriverConfiguration {
            driver: driver.to_string(),
            reason: reason.into(),
        }
    }

    /// Internal name of the driver involved, if any.
    pub fn driver(&self) -> Option<&str> {
        match self {
            MetadataError::DuplicateDriver(name) | MetadataError::UnknownDriver(name) => {
                Some(name)
            }
            MetadataError::InvalidDriverArguments { driver, .. }
            | MetadataError::DriverConfiguration { driver, .. }
            | MetadataError::TemplateRender { driver, .. }
            | MetadataError::DriverProcessing { driver, .. } => Some(driver),
            MetadataError::Config(_) | MetadataError::Io(_) => None,
        }
    }

    /// Whether this is a processing timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            MetadataError::DriverProcessing {
                kind: ProcessingFailure::Timeout(_),
                ..
            }
        )
    }
}

/// Why a call to the external analysis service failed.
#[derive(Debug, Error)]
pub enum ProcessingFailure {
    #[error("Connection error: {0}")]
    Network(String),

    #[error("Authentication rejected (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
