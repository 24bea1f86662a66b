//! Metadata processing service.
//!
//! Runs every applicable driver for a document file and collects one
//! outcome per driver.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::credentials::{ActionContext, CredentialResolver};
use crate::drivers::{
    ArgumentResolver, ConfigurationStore, DriverConfiguration, DriverContext, DriverDefaults,
    DriverRegistry, FileMetadataDriver, RegisteredDriver, ResultMapping,
};
use crate::error::{MetadataError, Result};
use crate::models::DocumentFile;
use crate::templating::{PlaceholderRenderer, TemplateRenderer};

/// Result of running one driver on a document file.
#[derive(Debug)]
pub struct DriverOutcome {
    /// Internal name of the driver.
    pub driver: String,
    pub result: Result<ResultMapping>,
}

impl DriverOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Service running configured drivers over document files.
pub struct MetadataProcessor {
    registry: Arc<DriverRegistry>,
    configurations: Arc<dyn ConfigurationStore>,
    credentials: CredentialResolver,
    defaults: DriverDefaults,
    arguments: ArgumentResolver,
}

impl MetadataProcessor {
    /// Create a processor using the placeholder template renderer and no
    /// settings defaults.
    pub fn new(
        registry: Arc<DriverRegistry>,
        configurations: Arc<dyn ConfigurationStore>,
        credentials: CredentialResolver,
    ) -> Self {
        Self {
            registry,
            configurations,
            credentials,
            defaults: DriverDefaults::new(),
            arguments: ArgumentResolver::new(Arc::new(PlaceholderRenderer::new())),
        }
    }

    pub fn with_defaults(mut self, defaults: DriverDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.arguments = ArgumentResolver::new(renderer);
        self
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Run every enabled driver configured for the file's document type
    /// that applies to its MIME type.
    ///
    /// Drivers run concurrently. Outcomes come back in registration order,
    /// and a failing driver does not affect the others.
    pub async fn process_document_file(&self, document_file: &DocumentFile) -> Vec<DriverOutcome> {
        let applicable = self.registry.get_configurations_for_document_type(
            self.configurations.as_ref(),
            &document_file.document_type,
            &document_file.mime_type,
        );

        if applicable.is_empty() {
            debug!(
                "No drivers apply to document file {} ({}, {})",
                document_file.id, document_file.document_type, document_file.mime_type
            );
            return Vec::new();
        }

        info!(
            "Running {} driver(s) on document file {}",
            applicable.len(),
            document_file.id
        );

        let runs = applicable
            .into_iter()
            .map(|(registered, configuration)| async move {
                let result = self.run(registered, &configuration, document_file).await;
                DriverOutcome {
                    driver: registered.descriptor.internal_name.to_string(),
                    result,
                }
            });

        join_all(runs).await
    }

    /// Run a single driver by internal name.
    ///
    /// The driver must be configured for the file's document type and
    /// support its MIME type. The configuration's `enabled` flag is not
    /// consulted, so disabled drivers can be tried explicitly.
    pub async fn process_with_driver(
        &self,
        name: &str,
        document_file: &DocumentFile,
    ) -> Result<ResultMapping> {
        let registered = self
            .registry
            .get(name)
            .ok_or_else(|| MetadataError::UnknownDriver(name.to_string()))?;

        let configuration = self
            .configurations
            .configuration(&document_file.document_type, name)
            .ok_or_else(|| {
                MetadataError::configuration(
                    name,
                    format!(
                        "not configured for document type {}",
                        document_file.document_type
                    ),
                )
            })?;

        if !registered
            .descriptor
            .supports_mime_type(&document_file.mime_type)
        {
            return Err(MetadataError::configuration(
                name,
                format!("does not support MIME type {}", document_file.mime_type),
            ));
        }

        if !configuration.enabled {
            debug!(
                "Running disabled driver {} on request for document type {}",
                name, document_file.document_type
            );
        }

        self.run(registered, &configuration, document_file).await
    }

    async fn run(
        &self,
        registered: &RegisteredDriver,
        configuration: &DriverConfiguration,
        document_file: &DocumentFile,
    ) -> Result<ResultMapping> {
        let name = registered.descriptor.internal_name;

        let arguments = self.arguments.resolve_arguments(
            &registered.descriptor,
            &self.defaults,
            configuration,
            document_file,
        )?;

        let context = DriverContext {
            credentials: &self.credentials,
            action: ActionContext {
                driver: name.to_string(),
                document_type: configuration.document_type.clone(),
                document_file: document_file.id.clone(),
            },
        };
        let driver = registered.construct(arguments, &context)?;

        let result = driver.process(document_file).await;
        match result {
            Ok(ref mapping) => debug!(
                "Driver {} produced {} value(s) for document file {}",
                name,
                mapping.len(),
                document_file.id
            ),
            Err(ref e) => warn!("{}", e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ConfiguredCredentialStore, StaticBackend, StoredCredentialRef};
    use crate::drivers::{DriverArguments, DriverDescriptor, InMemoryConfigurationStore};
    use crate::error::ProcessingFailure;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    const ECHO: DriverDescriptor = DriverDescriptor {
        internal_name: "echo",
        label: "Echo",
        description: "Returns its arguments.",
        enabled: true,
        mime_types: &["*"],
        argument_names: &["prompt", "stored_credential_id", "delay_ms"],
        default_arguments: &[("delay_ms", "0")],
    };

    const BROKEN: DriverDescriptor = DriverDescriptor {
        internal_name: "broken",
        label: "Broken",
        description: "Always fails.",
        enabled: true,
        mime_types: &["text/*"],
        argument_names: &["delay_ms"],
        default_arguments: &[],
    };

    const SLOW: DriverDescriptor = DriverDescriptor {
        internal_name: "slow",
        label: "Slow",
        description: "Sleeps, then succeeds.",
        enabled: true,
        mime_types: &["*"],
        argument_names: &["delay_ms"],
        default_arguments: &[("delay_ms", "200")],
    };

    struct TestDriver {
        descriptor: DriverDescriptor,
        arguments: DriverArguments,
        token: Option<String>,
        fail: bool,
    }

    #[async_trait]
    impl FileMetadataDriver for TestDriver {
        fn descriptor(&self) -> &DriverDescriptor {
            &self.descriptor
        }

        async fn process(&self, document_file: &DocumentFile) -> Result<ResultMapping> {
            let delay = self
                .arguments
                .parse::<u64>(self.descriptor.internal_name, "delay_ms")?
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if self.fail {
                return Err(MetadataError::DriverProcessing {
                    driver: self.descriptor.internal_name.to_string(),
                    document_file: document_file.id.clone(),
                    kind: ProcessingFailure::Api {
                        status: 500,
                        body: "boom".to_string(),
                    },
                });
            }

            let response = json!({
                "arguments": serde_json::to_value(&self.arguments).unwrap(),
                "has_token": self.token.is_some(),
            });
            Ok(ResultMapping::from_response(&response))
        }
    }

    fn echo(
        arguments: DriverArguments,
        context: &DriverContext<'_>,
    ) -> Result<Box<dyn FileMetadataDriver>> {
        let credential = arguments.required("echo", "stored_credential_id")?;
        let token = context
            .credentials
            .resolve_token(&StoredCredentialRef::new(credential), &context.action)?;
        Ok(Box::new(TestDriver {
            descriptor: ECHO,
            arguments,
            token: Some(token.expose().to_string()),
            fail: false,
        }))
    }

    fn broken(
        arguments: DriverArguments,
        _context: &DriverContext<'_>,
    ) -> Result<Box<dyn FileMetadataDriver>> {
        Ok(Box::new(TestDriver {
            descriptor: BROKEN,
            arguments,
            token: None,
            fail: true,
        }))
    }

    fn slow(
        arguments: DriverArguments,
        _context: &DriverContext<'_>,
    ) -> Result<Box<dyn FileMetadataDriver>> {
        Ok(Box::new(TestDriver {
            descriptor: SLOW,
            arguments,
            token: None,
            fail: false,
        }))
    }

    fn registry() -> Arc<DriverRegistry> {
        let mut registry = DriverRegistry::new();
        registry.register(SLOW, slow).unwrap();
        registry.register(BROKEN, broken).unwrap();
        registry.register(ECHO, echo).unwrap();
        Arc::new(registry)
    }

    fn configuration(
        driver: &str,
        enabled: bool,
        credential: Option<&str>,
        arguments: &[(&str, &str)],
    ) -> DriverConfiguration {
        DriverConfiguration {
            document_type: "invoice".to_string(),
            driver: driver.to_string(),
            enabled,
            credential: credential.map(StoredCredentialRef::new),
            arguments: arguments
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn credentials() -> CredentialResolver {
        let mut store = ConfiguredCredentialStore::new();
        store.insert(
            StoredCredentialRef::new("main"),
            Arc::new(StaticBackend::new(
                [("token".to_string(), "sk-test".to_string())]
                    .into_iter()
                    .collect(),
            )),
        );
        CredentialResolver::new(Arc::new(store))
    }

    fn processor(configurations: Vec<DriverConfiguration>) -> MetadataProcessor {
        let mut store = InMemoryConfigurationStore::new();
        for configuration in configurations {
            store.insert(configuration).unwrap();
        }
        MetadataProcessor::new(registry(), Arc::new(store), credentials())
    }

    fn file(filename: &str, content: &str) -> DocumentFile {
        DocumentFile::from_bytes("42", "invoice", filename, content.as_bytes())
    }

    #[tokio::test]
    async fn test_outcomes_in_registration_order() {
        let processor = processor(vec![
            configuration(
                "echo",
                true,
                Some("main"),
                &[("prompt", "Read {{ document_file.filename|upper }}")],
            ),
            configuration("broken", true, None, &[]),
            configuration("slow", true, None, &[("delay_ms", "10")]),
        ]);

        let outcomes = processor
            .process_document_file(&file("memo.txt", "hello"))
            .await;
        let names: Vec<_> = outcomes.iter().map(|o| o.driver.as_str()).collect();
        assert_eq!(names, vec!["slow", "broken", "echo"]);

        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1].result,
            Err(MetadataError::DriverProcessing { ref driver, .. }) if driver == "broken"
        ));

        let echoed = outcomes[2].result.as_ref().unwrap();
        assert_eq!(echoed.get("arguments__prompt"), Some(&json!("Read MEMO.TXT")));
        assert_eq!(
            echoed.get("arguments__stored_credential_id"),
            Some(&json!("main"))
        );
        assert_eq!(echoed.get("arguments__delay_ms"), Some(&json!("0")));
        assert_eq!(echoed.get("has_token"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_mime_and_enabled_filtering() {
        let processor = processor(vec![
            configuration("broken", true, None, &[]),
            configuration("slow", false, None, &[]),
        ]);

        // Broken only handles text/*; slow is disabled
        let outcomes = processor
            .process_document_file(&file("scan.pdf", "%PDF-1.4\n"))
            .await;
        assert!(outcomes.is_empty());

        let outcomes = processor
            .process_document_file(&file("notes.txt", "plain"))
            .await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].driver, "broken");
    }

    #[tokio::test]
    async fn test_drivers_run_concurrently() {
        let mut registry = DriverRegistry::new();
        registry.register(SLOW, slow).unwrap();
        registry
            .register(
                DriverDescriptor {
                    internal_name: "slow_too",
                    ..SLOW
                },
                slow,
            )
            .unwrap();

        let mut store = InMemoryConfigurationStore::new();
        store.insert(configuration("slow", true, None, &[])).unwrap();
        store
            .insert(configuration("slow_too", true, None, &[]))
            .unwrap();
        let processor = MetadataProcessor::new(Arc::new(registry), Arc::new(store), credentials());

        let start = Instant::now();
        let outcomes = processor
            .process_document_file(&file("a.txt", "a"))
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(DriverOutcome::is_success));
        assert!(start.elapsed() < Duration::from_millis(390));
    }

    #[tokio::test]
    async fn test_render_and_credential_failures_are_per_driver() {
        let processor = processor(vec![
            configuration("slow", true, None, &[("delay_ms", "{{ document_file.missing }}")]),
            configuration("echo", true, Some("absent"), &[]),
        ]);

        let outcomes = processor
            .process_document_file(&file("a.txt", "a"))
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0].result,
            Err(MetadataError::TemplateRender { ref argument, .. }) if argument == "delay_ms"
        ));
        assert!(matches!(
            outcomes[1].result,
            Err(MetadataError::DriverConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_settings_defaults_apply() {
        let mut defaults = DriverDefaults::new();
        defaults.set("echo", "prompt", "default prompt");
        let processor = processor(vec![configuration(
            "echo",
            true,
            Some("main"),
            &[("prompt", "{{ document_file.attributes.note|default:\"\" }}")],
        )])
        .with_defaults(defaults);

        let mapping = processor
            .process_with_driver("echo", &file("a.txt", "a"))
            .await
            .unwrap();
        // Blank rendered value falls back to the settings default
        assert_eq!(mapping.get("arguments__prompt"), Some(&json!("default prompt")));
    }

    #[tokio::test]
    async fn test_process_with_driver() {
        let processor = processor(vec![
            configuration("slow", false, None, &[("delay_ms", "1")]),
            configuration("broken", true, None, &[]),
        ]);

        // Explicit runs ignore the enabled flag
        assert!(processor
            .process_with_driver("slow", &file("a.txt", "a"))
            .await
            .is_ok());

        assert!(matches!(
            processor.process_with_driver("nope", &file("a.txt", "a")).await,
            Err(MetadataError::UnknownDriver(_))
        ));
        assert!(matches!(
            processor.process_with_driver("echo", &file("a.txt", "a")).await,
            Err(MetadataError::DriverConfiguration { .. })
        ));
        assert!(matches!(
            processor
                .process_with_driver("broken", &file("scan.pdf", "%PDF-1.4\n"))
                .await,
            Err(MetadataError::DriverConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_openai_driver_end_to_end() {
        use axum::routing::post;
        use axum::{Json, Router};
        use std::sync::Mutex;

        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/v1/responses",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(body);
                    Json(json!({"output": [{"content": [{"text": "A memo."}]}]}))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let registry = Arc::new(DriverRegistry::with_defaults());
        let mut store = InMemoryConfigurationStore::new();
        store
            .insert(configuration(
                "openai_response",
                true,
                Some("main"),
                &[
                    ("model", "gpt-5-nano"),
                    ("input", "\"Summarize: {{ document_file.text|truncate:5 }}\""),
                    ("base_url", &format!("http://{}/v1", addr)),
                ],
            ))
            .unwrap();
        let processor = MetadataProcessor::new(registry, Arc::new(store), credentials());

        let outcomes = processor
            .process_document_file(&file("memo.txt", "hello world"))
            .await;
        assert_eq!(outcomes.len(), 1);
        let mapping = outcomes[0].result.as_ref().unwrap();
        assert_eq!(
            mapping.get("output__0__content__0__text"),
            Some(&json!("A memo."))
        );

        let requests = seen.lock().unwrap();
        assert_eq!(requests[0]["input"], json!("Summarize: hello"));
        assert_eq!(requests[0]["model"], json!("gpt-5-nano"));
    }
}
