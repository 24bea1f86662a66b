//! Driver arguments: settings defaults and template resolution.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::configuration::DriverConfiguration;
use super::descriptor::DriverDescriptor;
use crate::error::{MetadataError, Result};
use crate::models::DocumentFile;
use crate::templating::{TemplateContext, TemplateRenderer};

/// Argument carrying the stored credential reference.
pub const CREDENTIAL_ARGUMENT: &str = "stored_credential_id";

/// Concrete argument values a driver is constructed with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverArguments(BTreeMap<String, String>);

impl DriverArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of `name` if present and not blank, trimmed.
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Value of `name`, failing when missing or blank.
    pub fn required(&self, driver: &str, name: &str) -> Result<&str> {
        self.optional(name)
            .ok_or_else(|| MetadataError::invalid_argument(driver, name, "a value is required"))
    }

    /// Parse `name` into `T` when present.
    pub fn parse<T>(&self, driver: &str, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(name)
            .map(|raw| {
                raw.parse().map_err(|e| {
                    MetadataError::invalid_argument(
                        driver,
                        name,
                        format!("cannot parse '{}': {}", raw, e),
                    )
                })
            })
            .transpose()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for DriverArguments {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Process-wide literal defaults per driver, merged beneath configuration
/// values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverDefaults {
    drivers: BTreeMap<String, BTreeMap<String, String>>,
}

impl DriverDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, driver: &str, argument: &str, value: impl Into<String>) {
        self.drivers
            .entry(driver.to_string())
            .or_default()
            .insert(argument.to_string(), value.into());
    }

    pub fn get(&self, driver: &str, argument: &str) -> Option<&str> {
        self.drivers
            .get(driver)
            .and_then(|args| args.get(argument))
            .map(String::as_str)
    }

    pub fn for_driver(&self, driver: &str) -> Option<&BTreeMap<String, String>> {
        self.drivers.get(driver)
    }

    /// Environment variable that overrides a default:
    /// `FILEMETA_<DRIVER>_<ARGUMENT>`, upper case.
    pub fn env_var_name(driver: &str, argument: &str) -> String {
        format!("FILEMETA_{}_{}", driver, argument).to_uppercase()
    }

    /// Apply environment variable overrides for every argument of `descriptors`.
    pub fn with_env_overrides<'a>(
        self,
        descriptors: impl IntoIterator<Item = &'a DriverDescriptor>,
    ) -> Self {
        self.with_overrides_from(descriptors, |name| std::env::var(name).ok())
    }

    /// Apply overrides looked up through `lookup` by variable name.
    pub fn with_overrides_from<'a>(
        mut self,
        descriptors: impl IntoIterator<Item = &'a DriverDescriptor>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        for descriptor in descriptors {
            for argument in descriptor.argument_names {
                // Secrets never come from defaults.
                if *argument == CREDENTIAL_ARGUMENT {
                    continue;
                }
                let var = Self::env_var_name(descriptor.internal_name, argument);
                if let Some(value) = lookup(&var) {
                    debug!("Default for {}.{} overridden by {}", descriptor.internal_name, argument, var);
                    self.set(descriptor.internal_name, argument, value);
                }
            }
        }
        self
    }
}

/// Renders configuration templates into driver arguments.
#[derive(Clone)]
pub struct ArgumentResolver {
    renderer: Arc<dyn TemplateRenderer>,
}

impl ArgumentResolver {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }

    /// Render every argument template of `configuration` against
    /// `document_file`. Either all keys render or the call fails.
    pub fn resolve(
        &self,
        configuration: &DriverConfiguration,
        document_file: &DocumentFile,
    ) -> Result<BTreeMap<String, String>> {
        let context = TemplateContext::new()
            .with("document_file", document_file)
            .map_err(|source| MetadataError::TemplateRender {
                driver: configuration.driver.clone(),
                argument: String::new(),
                document_file: document_file.id.clone(),
                source,
            })?;

        configuration
            .arguments
            .iter()
            .map(|(key, template)| {
                self.renderer
                    .render(template, &context)
                    .map(|rendered| (key.clone(), rendered))
                    .map_err(|source| MetadataError::TemplateRender {
                        driver: configuration.driver.clone(),
                        argument: key.clone(),
                        document_file: document_file.id.clone(),
                        source,
                    })
            })
            .collect()
    }

    /// Build the full argument set for a driver.
    ///
    /// Layers, lowest first: the descriptor's built-in defaults, settings
    /// defaults, the configuration's credential reference, rendered
    /// configuration values. Defaults are literal. Blank rendered values
    /// count as not provided.
    pub fn resolve_arguments(
        &self,
        descriptor: &DriverDescriptor,
        defaults: &DriverDefaults,
        configuration: &DriverConfiguration,
        document_file: &DocumentFile,
    ) -> Result<DriverArguments> {
        configuration.validate(descriptor)?;

        let mut arguments = DriverArguments::new();
        for (name, value) in descriptor.default_arguments {
            arguments.insert(*name, *value);
        }
        if let Some(settings) = defaults.for_driver(descriptor.internal_name) {
            for (name, value) in settings {
                if descriptor.accepts_argument(name) {
                    arguments.insert(name.clone(), value.clone());
                }
            }
        }
        if let Some(ref credential) = configuration.credential {
            if descriptor.accepts_argument(CREDENTIAL_ARGUMENT) {
                arguments.insert(CREDENTIAL_ARGUMENT, credential.as_str());
            }
        }

        for (name, rendered) in self.resolve(configuration, document_file)? {
            if !rendered.trim().is_empty() {
                arguments.insert(name, rendered);
            }
        }

        debug!(
            "Resolved {} argument(s) for driver {} on document file {}",
            arguments.len(),
            descriptor.internal_name,
            document_file.id
        );
        Ok(arguments)
    }
}
