//! filemeta - pluggable file-metadata drivers.
//!
//! Drivers analyze a document file through an external service and return
//! a flat key/value mapping. Which drivers run for a file is decided by the
//! driver configurations of its document type; their arguments are
//! templates rendered against the file at invocation time.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod drivers;
pub mod error;
pub mod models;
pub mod services;
pub mod templating;
pub mod utils;

pub use config::Config;
pub use drivers::{
    DriverDescriptor, DriverRegistry, FileMetadataDriver, OpenAiResponseDriver, ResultMapping,
};
pub use error::{MetadataError, ProcessingFailure, Result};
pub use models::DocumentFile;
pub use services::{DriverOutcome, MetadataProcessor};
