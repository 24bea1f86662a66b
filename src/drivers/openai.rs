//! OpenAI Responses API driver.
//!
//! Sends a prompt built from the document file to `POST {base_url}/responses`
//! and returns the flattened JSON response, e.g. `output__0__content__0__text`.
//!
//! The `input` argument is read as YAML: a plain sentence stays a string
//! prompt, while a YAML list of `{role, content}` mappings is sent as a
//! message list. Document content must go through the `json` template
//! filter, which renders it as a quoted scalar:
//!
//! ```yaml
//! - role: developer
//!   content: Summarize the document.
//! - role: user
//!   content: {{ document_file.text|truncate:4000|json }}
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::arguments::{DriverArguments, CREDENTIAL_ARGUMENT};
use super::descriptor::DriverDescriptor;
use super::flatten::ResultMapping;
use super::{DriverContext, FileMetadataDriver};
use crate::credentials::{ApiToken, StoredCredentialRef};
use crate::error::{MetadataError, ProcessingFailure, Result};
use crate::models::DocumentFile;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest response body quoted in error messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Driver for OpenAI's Responses API.
pub struct OpenAiResponseDriver {
    base_url: Url,
    input: Value,
    model: String,
    organization: Option<String>,
    project: Option<String>,
    timeout: Duration,
    api_key: ApiToken,
    client: Client,
}

/// Responses API request body.
#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<&'a Value>,
}

impl OpenAiResponseDriver {
    pub const DESCRIPTOR: DriverDescriptor = DriverDescriptor {
        internal_name: "openai_response",
        label: "OpenAI Response API driver",
        description: "Analyze content using OpenAI's Response API.",
        enabled: false,
        mime_types: &["*"],
        argument_names: &[
            "base_url",
            "input",
            "model",
            "organization",
            "project",
            "stored_credential_id",
            "timeout",
        ],
        default_arguments: &[("timeout", "60")],
    };

    /// Validate arguments, then resolve the API key.
    pub fn new(arguments: DriverArguments, context: &DriverContext<'_>) -> Result<Self> {
        let name = Self::DESCRIPTOR.internal_name;

        let model = arguments.required(name, "model")?.to_string();
        let credential = StoredCredentialRef::new(arguments.required(name, CREDENTIAL_ARGUMENT)?);

        let timeout_secs = arguments
            .parse::<u64>(name, "timeout")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(MetadataError::invalid_argument(
                name,
                "timeout",
                "must be at least one second",
            ));
        }
        let timeout = Duration::from_secs(timeout_secs);

        let base_url = arguments.optional("base_url").unwrap_or(DEFAULT_BASE_URL);
        let base_url = Url::parse(base_url).map_err(|e| {
            MetadataError::invalid_argument(name, "base_url", format!("'{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(MetadataError::invalid_argument(
                name,
                "base_url",
                format!("'{}' is not an http(s) URL", base_url),
            ));
        }

        let input = parse_input(arguments.get("input"))?;
        let organization = arguments.optional("organization").map(str::to_string);
        let project = arguments.optional("project").map(str::to_string);

        let api_key = context
            .credentials
            .resolve_token(&credential, &context.action)?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                MetadataError::configuration(name, format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url,
            input,
            model,
            organization,
            project,
            timeout,
            api_key,
            client,
        })
    }

    /// Constructor registered with the driver registry.
    pub fn construct(
        arguments: DriverArguments,
        context: &DriverContext<'_>,
    ) -> Result<Box<dyn FileMetadataDriver>> {
        Ok(Box::new(Self::new(arguments, context)?))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    /// `{base_url}/responses`, keeping any query string of the base URL.
    fn endpoint(&self) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("responses");
        }
        url
    }

    fn classify(&self, error: reqwest::Error) -> ProcessingFailure {
        if error.is_timeout() {
            ProcessingFailure::Timeout(self.timeout)
        } else if error.is_decode() {
            ProcessingFailure::MalformedResponse(error.to_string())
        } else {
            ProcessingFailure::Network(error.to_string())
        }
    }
}

#[async_trait]
impl FileMetadataDriver for OpenAiResponseDriver {
    fn descriptor(&self) -> &DriverDescriptor {
        &Self::DESCRIPTOR
    }

    async fn process(&self, document_file: &DocumentFile) -> Result<ResultMapping> {
        let failure = |kind| MetadataError::DriverProcessing {
            driver: Self::DESCRIPTOR.internal_name.to_string(),
            document_file: document_file.id.clone(),
            kind,
        };

        let request = ResponsesRequest {
            model: &self.model,
            input: Some(&self.input).filter(|input| !input.is_null()),
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .json(&request);
        if let Some(ref organization) = self.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }
        if let Some(ref project) = self.project {
            builder = builder.header("OpenAI-Project", project);
        }

        info!(
            "Analyzing document file {} with {} (model {})",
            document_file.id,
            Self::DESCRIPTOR.internal_name,
            self.model
        );
        let start = Instant::now();

        let response = builder
            .send()
            .await
            .map_err(|e| failure(self.classify(e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| failure(self.classify(e)))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(failure(ProcessingFailure::Authentication {
                status: status.as_u16(),
                body: truncate_body(&body),
            }));
        }
        if !status.is_success() {
            return Err(failure(ProcessingFailure::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            }));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| failure(ProcessingFailure::MalformedResponse(e.to_string())))?;
        if !value.is_object() {
            return Err(failure(ProcessingFailure::MalformedResponse(
                "expected a JSON object".to_string(),
            )));
        }

        let result = ResultMapping::from_response(&value);
        debug!(
            "Document file {} produced {} value(s) in {}ms",
            document_file.id,
            result.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }
}

/// Parse the `input` argument as YAML. Blank input is sent as no input.
fn parse_input(raw: Option<&str>) -> Result<Value> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Value::Null),
        Some(text) => serde_yaml::from_str(text).map_err(|e| {
            MetadataError::invalid_argument(
                OpenAiResponseDriver::DESCRIPTOR.internal_name,
                "input",
                format!("invalid YAML: {}", e),
            )
        }),
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
