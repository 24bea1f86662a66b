//! Driver registration and selection.
//!
//! The registry is filled once at startup and shared read-only afterwards.
//! Lookups preserve registration order so the set of drivers run for a
//! document file, and the order of their outcomes, is stable.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::arguments::DriverArguments;
use super::configuration::{ConfigurationStore, DriverConfiguration};
use super::descriptor::DriverDescriptor;
use super::openai::OpenAiResponseDriver;
use super::{DriverConstructor, DriverContext, FileMetadataDriver};
use crate::error::{MetadataError, Result};

/// A registered driver variant.
pub struct RegisteredDriver {
    pub descriptor: DriverDescriptor,
    constructor: DriverConstructor,
}

impl RegisteredDriver {
    /// Build a driver instance from fully resolved arguments.
    pub fn construct(
        &self,
        arguments: DriverArguments,
        context: &DriverContext<'_>,
    ) -> Result<Box<dyn FileMetadataDriver>> {
        (self.constructor)(arguments, context)
    }
}

impl std::fmt::Debug for RegisteredDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredDriver")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Registry of driver variants keyed by internal name.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: Vec<RegisteredDriver>,
    index: HashMap<&'static str, usize>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in drivers registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_builtin();
        registry
    }

    /// Register the built-in drivers.
    pub fn register_builtin(&mut self) {
        let builtin: [(DriverDescriptor, DriverConstructor); 1] =
            [(OpenAiResponseDriver::DESCRIPTOR, OpenAiResponseDriver::construct)];

        for (descriptor, constructor) in builtin {
            if let Err(e) = self.register(descriptor, constructor) {
                warn!("Skipping built-in driver: {}", e);
            }
        }
    }

    /// Register a driver variant.
    pub fn register(
        &mut self,
        descriptor: DriverDescriptor,
        constructor: DriverConstructor,
    ) -> Result<()> {
        if self.index.contains_key(descriptor.internal_name) {
            return Err(MetadataError::DuplicateDriver(
                descriptor.internal_name.to_string(),
            ));
        }

        debug!("Registered driver {}", descriptor.internal_name);
        self.index
            .insert(descriptor.internal_name, self.drivers.len());
        self.drivers.push(RegisteredDriver {
            descriptor,
            constructor,
        });
        Ok(())
    }

    /// Get a driver by internal name.
    pub fn get(&self, internal_name: &str) -> Option<&RegisteredDriver> {
        self.index.get(internal_name).map(|&i| &self.drivers[i])
    }

    /// Build an instance of the driver registered as `internal_name`.
    pub fn construct(
        &self,
        internal_name: &str,
        arguments: DriverArguments,
        context: &DriverContext<'_>,
    ) -> Result<Box<dyn FileMetadataDriver>> {
        self.get(internal_name)
            .ok_or_else(|| MetadataError::UnknownDriver(internal_name.to_string()))?
            .construct(arguments, context)
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &DriverDescriptor> {
        self.drivers.iter().map(|d| &d.descriptor)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Enabled configurations for a document type whose driver applies to
    /// `mime_type`, in driver registration order.
    ///
    /// Configurations naming unregistered drivers are skipped.
    pub fn get_configurations_for_document_type(
        &self,
        store: &dyn ConfigurationStore,
        document_type: &str,
        mime_type: &str,
    ) -> Vec<(&RegisteredDriver, DriverConfiguration)> {
        let mut by_driver: HashMap<String, DriverConfiguration> = HashMap::new();
        for configuration in store.configurations_for(document_type) {
            if self.get(&configuration.driver).is_none() {
                warn!(
                    "Document type {} configures unknown driver {}",
                    document_type, configuration.driver
                );
                continue;
            }
            by_driver
                .entry(configuration.driver.clone())
                .or_insert(configuration);
        }

        self.drivers
            .iter()
            .filter_map(|registered| {
                let configuration = by_driver.remove(registered.descriptor.internal_name)?;
                if !configuration.enabled {
                    debug!(
                        "Driver {} disabled for document type {}",
                        registered.descriptor.internal_name, document_type
                    );
                    return None;
                }
                if !registered.descriptor.supports_mime_type(mime_type) {
                    debug!(
                        "Driver {} does not apply to {}",
                        registered.descriptor.internal_name, mime_type
                    );
                    return None;
                }
                Some((registered, configuration))
            })
            .collect()
    }
}
