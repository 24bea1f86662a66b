//! Template rendering for driver arguments.
//!
//! Driver configurations store raw template strings. Rendering goes through
//! the [`TemplateRenderer`] trait so the engine can be swapped without
//! touching the argument resolver.

mod placeholder;

pub use placeholder::PlaceholderRenderer;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from template rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Unterminated expression starting at offset {0}")]
    Unterminated(usize),

    #[error("Empty expression at offset {0}")]
    EmptyExpression(usize),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("'{path}' has no attribute '{attribute}'")]
    UnknownAttribute { path: String, attribute: String },

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Invalid argument for filter {filter}: {reason}")]
    InvalidFilterArgument { filter: String, reason: String },

    #[error("Cannot build template context: {0}")]
    Context(String),
}

/// Variables bound while rendering a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    variables: Map<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a serializable value under `name`.
    pub fn with<T: Serialize>(mut self, name: &str, value: &T) -> Result<Self, TemplateError> {
        let value =
            serde_json::to_value(value).map_err(|e| TemplateError::Context(e.to_string()))?;
        self.variables.insert(name.to_string(), value);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Renders a template string against a context.
///
/// Implementations must be pure: the output depends only on the template
/// and the context passed in.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &TemplateContext) -> Result<String, TemplateError>;
}
