//! Built-in credential backends.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    ActionContext, Credential, CredentialBackend, CredentialError, CredentialStore,
    StoredCredentialRef, TOKEN_KEY,
};

/// Credential backend configuration from the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CredentialBackendConfig {
    /// Values written directly in the config file.
    Static {
        #[serde(default)]
        values: Credential,
    },
    /// Token read from an environment variable at lookup time.
    Environment {
        variable: String,
        /// Extra non-secret values returned alongside the token.
        #[serde(default)]
        values: Credential,
    },
}

impl CredentialBackendConfig {
    pub fn build(&self) -> Arc<dyn CredentialBackend> {
        match self {
            CredentialBackendConfig::Static { values } => {
                Arc::new(StaticBackend::new(values.clone()))
            }
            CredentialBackendConfig::Environment { variable, values } => Arc::new(
                EnvironmentBackend::new(variable.clone()).with_values(values.clone()),
            ),
        }
    }
}

/// Backend returning a fixed mapping.
#[derive(Debug, Clone)]
pub struct StaticBackend {
    values: Credential,
}

impl StaticBackend {
    pub fn new(values: Credential) -> Self {
        Self { values }
    }
}

impl CredentialBackend for StaticBackend {
    fn backend_name(&self) -> &str {
        "static"
    }

    fn get_credential(&self, _action: &ActionContext) -> Result<Credential, CredentialError> {
        Ok(self.values.clone())
    }
}

/// Backend reading the token from an environment variable.
///
/// An unset variable yields a mapping without `token`, which the resolver
/// reports as a configuration error.
#[derive(Debug, Clone)]
pub struct EnvironmentBackend {
    variable: String,
    values: Credential,
}

impl EnvironmentBackend {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            values: Credential::new(),
        }
    }

    pub fn with_values(mut self, values: Credential) -> Self {
        self.values = values;
        self
    }
}

impl CredentialBackend for EnvironmentBackend {
    fn backend_name(&self) -> &str {
        "environment"
    }

    fn get_credential(&self, _action: &ActionContext) -> Result<Credential, CredentialError> {
        let mut credential = self.values.clone();
        match std::env::var(&self.variable) {
            Ok(token) => {
                credential.insert(TOKEN_KEY.to_string(), token);
            }
            Err(std::env::VarError::NotPresent) => {
                credential.remove(TOKEN_KEY);
            }
            Err(e) => {
                return Err(CredentialError::Backend(format!(
                    "{}: {}",
                    self.variable, e
                )))
            }
        }
        Ok(credential)
    }
}

/// In-memory credential store, usually built from the config file.
#[derive(Default, Clone)]
pub struct ConfiguredCredentialStore {
    backends: HashMap<StoredCredentialRef, Arc<dyn CredentialBackend>>,
}

impl ConfiguredCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config<'a>(
        entries: impl IntoIterator<Item = (&'a String, &'a CredentialBackendConfig)>,
    ) -> Self {
        let mut store = Self::new();
        for (id, config) in entries {
            store.insert(StoredCredentialRef::new(id.as_str()), config.build());
        }
        store
    }

    pub fn insert(&mut self, id: StoredCredentialRef, backend: Arc<dyn CredentialBackend>) {
        self.backends.insert(id, backend);
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl CredentialStore for ConfiguredCredentialStore {
    fn backend(
        &self,
        credential: &StoredCredentialRef,
    ) -> Result<Arc<dyn CredentialBackend>, CredentialError> {
        self.backends
            .get(credential)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(credential.clone()))
    }
}
