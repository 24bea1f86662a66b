//! Configuration management.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credentials::{ConfiguredCredentialStore, CredentialBackendConfig, CredentialResolver};
use crate::drivers::{DriverConfigurationEntry, DriverDefaults, DriverRegistry, InMemoryConfigurationStore};
use crate::error::{MetadataError, Result};
use crate::services::MetadataProcessor;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "FILEMETA_CONFIG";

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Literal argument defaults per driver.
    #[serde(default)]
    pub defaults: DriverDefaults,
    /// Stored credentials by id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub credentials: HashMap<String, CredentialBackendConfig>,
    /// Driver bindings per document type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub document_types: BTreeMap<String, Vec<DriverConfigurationEntry>>,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Default config location: `<config dir>/filemeta/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("filemeta").join("config.toml"))
    }

    /// Load from `path` if given, otherwise from the default location if a
    /// file exists there, otherwise an empty config.
    pub async fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            let expanded = shellexpand::tilde(path);
            return Self::load_from_path(Path::new(expanded.as_ref())).await;
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path).await,
            _ => {
                debug!("No config file found, using empty configuration");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            MetadataError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| MetadataError::Config(format!("Failed to parse TOML config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| MetadataError::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| MetadataError::Config(format!("Failed to parse JSON config: {}", e)))?,
        };

        debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Build the configuration store, validating every entry against the
    /// registry.
    pub fn configuration_store(&self, registry: &DriverRegistry) -> Result<InMemoryConfigurationStore> {
        for (document_type, entries) in &self.document_types {
            for entry in entries {
                if let Some(ref credential) = entry.credential {
                    if !self.credentials.contains_key(credential.as_str()) {
                        warn!(
                            "Document type {} references undefined credential {}",
                            document_type, credential
                        );
                    }
                }
            }
        }
        InMemoryConfigurationStore::from_entries(registry, &self.document_types)
    }

    pub fn credential_resolver(&self) -> CredentialResolver {
        CredentialResolver::new(Arc::new(ConfiguredCredentialStore::from_config(
            &self.credentials,
        )))
    }

    /// Build a processor for `registry`. Settings defaults get
    /// `FILEMETA_<DRIVER>_<ARGUMENT>` environment overrides applied.
    pub fn build_processor(&self, registry: Arc<DriverRegistry>) -> Result<MetadataProcessor> {
        let store = self.configuration_store(&registry)?;
        let defaults = self
            .defaults
            .clone()
            .with_env_overrides(registry.descriptors());

        Ok(
            MetadataProcessor::new(registry, Arc::new(store), self.credential_resolver())
                .with_defaults(defaults),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ConfigurationStore;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOML_CONFIG: &str = r#"
[defaults.openai_response]
timeout = "30"

[credentials.openai]
backend = "environment"
variable = "OPENAI_API_KEY"

[[document_types.invoice]]
driver = "openai_response"
enabled = true
credential = "openai"
[document_types.invoice.arguments]
model = "gpt-5-nano"
input = '''
- role: developer
  content: Summarize the document.
- role: user
  content: {{ document_file.text|truncate:4000|json }}
'''
"#;

    fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_toml() {
        let file = write_config(".toml", TOML_CONFIG);
        let config = Config::load_from_path(file.path()).await.unwrap();

        assert_eq!(config.defaults.get("openai_response", "timeout"), Some("30"));
        assert!(matches!(
            config.credentials["openai"],
            CredentialBackendConfig::Environment { ref variable, .. } if variable == "OPENAI_API_KEY"
        ));
        assert_eq!(config.source_path.as_deref(), Some(file.path()));

        let registry = DriverRegistry::with_defaults();
        let store = config.configuration_store(&registry).unwrap();
        let invoice = store.configuration("invoice", "openai_response").unwrap();
        assert!(invoice.enabled);
        assert_eq!(invoice.arguments["model"], "gpt-5-nano");
    }

    #[test]
    fn test_example_input_keeps_document_text() {
        use crate::credentials::{ActionContext, StaticBackend, StoredCredentialRef};
        use crate::drivers::{ArgumentResolver, DriverContext, OpenAiResponseDriver};
        use crate::models::DocumentFile;
        use crate::templating::PlaceholderRenderer;
        use serde_json::json;

        let config: Config = toml::from_str(TOML_CONFIG).unwrap();
        let registry = DriverRegistry::with_defaults();
        let configuration = config
            .configuration_store(&registry)
            .unwrap()
            .configuration("invoice", "openai_response")
            .unwrap();

        let mut credentials = ConfiguredCredentialStore::new();
        credentials.insert(
            StoredCredentialRef::new("openai"),
            Arc::new(StaticBackend::new(
                [("token".to_string(), "sk-test".to_string())]
                    .into_iter()
                    .collect(),
            )),
        );
        let credentials = CredentialResolver::new(Arc::new(credentials));
        let resolver = ArgumentResolver::new(Arc::new(PlaceholderRenderer::new()));

        let text = "Invoice #42\nTotal: 10 USD\nDue: soon";
        let document_file = DocumentFile::from_bytes("42", "invoice", "invoice.txt", text.as_bytes());
        let arguments = resolver
            .resolve_arguments(
                &OpenAiResponseDriver::DESCRIPTOR,
                &config.defaults,
                &configuration,
                &document_file,
            )
            .unwrap();
        let context = DriverContext {
            credentials: &credentials,
            action: ActionContext {
                driver: "openai_response".to_string(),
                document_type: "invoice".to_string(),
                document_file: "42".to_string(),
            },
        };
        let driver = OpenAiResponseDriver::new(arguments, &context).unwrap();

        assert_eq!(
            driver.input(),
            &json!([
                {"role": "developer", "content": "Summarize the document."},
                {"role": "user", "content": text},
            ])
        );
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let yaml = write_config(
            ".yaml",
            "document_types:\n  memo:\n    - driver: openai_response\n      credential: main\n",
        );
        let config = Config::load_from_path(yaml.path()).await.unwrap();
        assert_eq!(config.document_types["memo"][0].driver, "openai_response");
        assert_eq!(config.document_types["memo"][0].enabled, None);

        let json = write_config(
            ".json",
            r#"{"credentials": {"main": {"backend": "static", "values": {"token": "abc"}}}}"#,
        );
        let config = Config::load_from_path(json.path()).await.unwrap();
        assert_eq!(config.credentials.len(), 1);
        assert!(config.document_types.is_empty());
    }

    #[tokio::test]
    async fn test_load_errors() {
        let broken = write_config(".toml", "defaults = [");
        assert!(matches!(
            Config::load_from_path(broken.path()).await,
            Err(MetadataError::Config(ref msg)) if msg.contains("TOML")
        ));

        assert!(matches!(
            Config::load(Some("/nonexistent/filemeta/config.toml")).await,
            Err(MetadataError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_driver_rejected_when_building() {
        let file = write_config(".toml", "[[document_types.invoice]]\ndriver = \"exif\"\n");
        let config = Config::load_from_path(file.path()).await.unwrap();
        let registry = Arc::new(DriverRegistry::with_defaults());
        assert!(matches!(
            config.build_processor(registry),
            Err(MetadataError::UnknownDriver(ref name)) if name == "exif"
        ));
    }

    #[test]
    fn test_build_processor() {
        let config: Config = toml::from_str(TOML_CONFIG).unwrap();
        let processor = config
            .build_processor(Arc::new(DriverRegistry::with_defaults()))
            .unwrap();
        assert_eq!(processor.registry().len(), 1);
    }
}
