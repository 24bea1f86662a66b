//! Stored credentials and their resolution into API tokens.
//!
//! Drivers never see where a secret lives. They hold a
//! [`StoredCredentialRef`] and ask the [`CredentialResolver`] for a token,
//! passing an [`ActionContext`] that backends can use to scope or audit the
//! access.

mod backends;

pub use backends::{
    ConfiguredCredentialStore, CredentialBackendConfig, EnvironmentBackend, StaticBackend,
};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::{MetadataError, Result};

/// Key a credential mapping must provide for bearer authentication.
pub const TOKEN_KEY: &str = "token";

/// Values returned by a credential backend.
pub type Credential = BTreeMap<String, String>;

/// Opaque identifier of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredCredentialRef(String);

impl StoredCredentialRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoredCredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is using a credential, and for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionContext {
    /// Internal name of the requesting driver.
    pub driver: String,
    pub document_type: String,
    /// Document file being processed.
    pub document_file: String,
}

/// Secret token resolved from a credential. Redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Errors from credential backends.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential not found: {0}")]
    NotFound(StoredCredentialRef),

    #[error("Credential backend error: {0}")]
    Backend(String),
}

/// A source of secrets.
pub trait CredentialBackend: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &str;

    /// Return the credential values. The mapping may lack a `token` key.
    fn get_credential(
        &self,
        action: &ActionContext,
    ) -> std::result::Result<Credential, CredentialError>;
}

/// Maps stored credential references to backends.
pub trait CredentialStore: Send + Sync {
    fn backend(
        &self,
        credential: &StoredCredentialRef,
    ) -> std::result::Result<Arc<dyn CredentialBackend>, CredentialError>;
}

/// Resolves stored credential references into tokens.
///
/// Holds no secrets itself; every call goes to the backend.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Fetch the raw credential mapping.
    pub fn resolve(
        &self,
        credential: &StoredCredentialRef,
        action: &ActionContext,
    ) -> Result<Credential> {
        let backend = self
            .store
            .backend(credential)
            .map_err(|e| MetadataError::configuration(&action.driver, e.to_string()))?;

        debug!(
            "Resolving credential {} via {} backend for driver {} (document file {})",
            credential,
            backend.backend_name(),
            action.driver,
            action.document_file
        );

        backend
            .get_credential(action)
            .map_err(|e| MetadataError::configuration(&action.driver, e.to_string()))
    }

    /// Fetch the credential and extract its token.
    pub fn resolve_token(
        &self,
        credential: &StoredCredentialRef,
        action: &ActionContext,
    ) -> Result<ApiToken> {
        let mut values = self.resolve(credential, action)?;
        match values.remove(TOKEN_KEY) {
            Some(token) if !token.is_empty() => Ok(ApiToken(token)),
            _ => Err(MetadataError::configuration(
                &action.driver,
                format!("credential {} does not provide a token", credential),
            )),
        }
    }
}
