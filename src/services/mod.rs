//! Service layer for filemeta.
//!
//! Ties the registry, configuration store, credentials and argument
//! resolution together. Used by the CLI, usable by any other front end.

pub mod processing;

pub use processing::{DriverOutcome, MetadataProcessor};
