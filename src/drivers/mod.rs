//! File metadata drivers.
//!
//! A driver turns a document file into a flat set of metadata by calling an
//! external analysis service. Drivers are registered in a
//! [`DriverRegistry`] under a stable internal name, bound to document types
//! by [`DriverConfiguration`]s, and constructed per invocation from
//! arguments rendered by the [`ArgumentResolver`].
//!
//! ## Built-in drivers
//!
//! - **openai_response**: OpenAI Responses API (disabled by default)

mod arguments;
mod configuration;
mod descriptor;
mod flatten;
mod openai;
mod registry;

pub use arguments::{ArgumentResolver, DriverArguments, DriverDefaults, CREDENTIAL_ARGUMENT};
pub use configuration::{
    ConfigurationStore, DriverConfiguration, DriverConfigurationEntry, InMemoryConfigurationStore,
};
pub use descriptor::DriverDescriptor;
pub use flatten::{flatten, Flatten, FlattenIter, ResultMapping, RESULT_SEPARATOR};
pub use openai::{OpenAiResponseDriver, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
pub use registry::{DriverRegistry, RegisteredDriver};

use async_trait::async_trait;

use crate::credentials::{ActionContext, CredentialResolver};
use crate::error::Result;
use crate::models::DocumentFile;

/// A pluggable analyzer producing metadata for document files.
///
/// Instances are built for one invocation and hold only their validated
/// configuration, so distinct instances may run concurrently.
#[async_trait]
pub trait FileMetadataDriver: Send + Sync {
    /// Registration metadata of this driver.
    fn descriptor(&self) -> &DriverDescriptor;

    /// Analyze a document file.
    ///
    /// Makes one outbound call. On failure no partial result is returned.
    async fn process(&self, document_file: &DocumentFile) -> Result<ResultMapping>;
}

/// What a driver constructor may use besides its arguments.
pub struct DriverContext<'a> {
    pub credentials: &'a CredentialResolver,
    /// Identifies the requester when resolving credentials.
    pub action: ActionContext,
}

/// Builds a driver from resolved arguments.
///
/// Constructors validate arguments before resolving credentials and must
/// not perform network I/O.
pub type DriverConstructor =
    fn(DriverArguments, &DriverContext<'_>) -> Result<Box<dyn FileMetadataDriver>>;
