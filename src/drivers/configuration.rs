//! Per-document-type driver configurations.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::descriptor::DriverDescriptor;
use super::registry::DriverRegistry;
use crate::credentials::StoredCredentialRef;
use crate::error::{MetadataError, Result};

/// Binds a driver to a document type with argument templates and a
/// credential reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfiguration {
    pub document_type: String,
    /// Internal name of the bound driver.
    pub driver: String,
    pub enabled: bool,
    pub credential: Option<StoredCredentialRef>,
    /// Argument name to raw template string.
    pub arguments: BTreeMap<String, String>,
}

impl DriverConfiguration {
    /// Check that every argument key is accepted by `descriptor`.
    pub fn validate(&self, descriptor: &DriverDescriptor) -> Result<()> {
        match self
            .arguments
            .keys()
            .find(|key| !descriptor.accepts_argument(key))
        {
            Some(key) => Err(MetadataError::invalid_argument(
                descriptor.internal_name,
                key,
                format!(
                    "not accepted by this driver (document type {}); expected one of: {}",
                    self.document_type,
                    descriptor.argument_names.join(", ")
                ),
            )),
            None => Ok(()),
        }
    }
}

/// Configuration entry as written in the config file, before defaults from
/// the driver descriptor are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfigurationEntry {
    pub driver: String,
    /// Falls back to the descriptor's `enabled` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<StoredCredentialRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, String>,
}

/// Read-only source of driver configurations.
pub trait ConfigurationStore: Send + Sync {
    /// All configurations for a document type, enabled or not.
    fn configurations_for(&self, document_type: &str) -> Vec<DriverConfiguration>;

    /// The configuration binding `driver` to `document_type`, if any.
    fn configuration(&self, document_type: &str, driver: &str) -> Option<DriverConfiguration> {
        self.configurations_for(document_type)
            .into_iter()
            .find(|config| config.driver == driver)
    }
}

/// Configuration store held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigurationStore {
    by_document_type: HashMap<String, Vec<DriverConfiguration>>,
}

impl InMemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration. A document type binds each driver at most once.
    pub fn insert(&mut self, configuration: DriverConfiguration) -> Result<()> {
        let entries = self
            .by_document_type
            .entry(configuration.document_type.clone())
            .or_default();
        if entries.iter().any(|c| c.driver == configuration.driver) {
            return Err(MetadataError::Config(format!(
                "document type {} configures driver {} more than once",
                configuration.document_type, configuration.driver
            )));
        }
        entries.push(configuration);
        Ok(())
    }

    /// Build a store from config file entries, validating them against the
    /// registry.
    pub fn from_entries<'a>(
        registry: &DriverRegistry,
        document_types: impl IntoIterator<Item = (&'a String, &'a Vec<DriverConfigurationEntry>)>,
    ) -> Result<Self> {
        let mut store = Self::new();
        for (document_type, entries) in document_types {
            for entry in entries {
                let registered = registry
                    .get(&entry.driver)
                    .ok_or_else(|| MetadataError::UnknownDriver(entry.driver.clone()))?;
                let configuration = DriverConfiguration {
                    document_type: document_type.clone(),
                    driver: entry.driver.clone(),
                    enabled: entry.enabled.unwrap_or(registered.descriptor.enabled),
                    credential: entry.credential.clone(),
                    arguments: entry.arguments.clone(),
                };
                configuration.validate(&registered.descriptor)?;
                store.insert(configuration)?;
            }
        }
        Ok(store)
    }

    pub fn document_types(&self) -> impl Iterator<Item = &str> {
        self.by_document_type.keys().map(String::as_str)
    }
}

impl ConfigurationStore for InMemoryConfigurationStore {
    fn configurations_for(&self, document_type: &str) -> Vec<DriverConfiguration> {
        self.by_document_type
            .get(document_type)
            .cloned()
            .unwrap_or_default()
    }
}
