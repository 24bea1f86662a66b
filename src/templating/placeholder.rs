//! `{{ variable.attribute|filter }}` template renderer.
//!
//! Supported syntax:
//! - `{{ document_file.filename }}` - dotted lookup into the context
//! - `{{ document_file.attributes.tags.0 }}` - numeric segments index arrays
//! - `{{ value|lower }}`, `{{ value|upper }}`
//! - `{{ value|truncate:200 }}` - keep at most N characters
//! - `{{ value|default:"n/a" }}` - fallback for null, empty, or missing attributes
//! - `{{ value|json }}` - JSON string literal, safe to embed as a quoted
//!   YAML or JSON scalar

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{TemplateContext, TemplateError, TemplateRenderer};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

static PATH_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$|^[0-9]+$").expect("valid regex"));

static FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<name>[a-z_]+)(?::(?P<arg>"[^"]*"|'[^']*'|[^\s]+))?$"#).expect("valid regex")
});

/// Renderer for the placeholder template syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, context: &TemplateContext) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open
                .find(CLOSE)
                .ok_or(TemplateError::Unterminated(offset + start))?;

            let expression = after_open[..end].trim();
            if expression.is_empty() {
                return Err(TemplateError::EmptyExpression(offset + start));
            }
            output.push_str(&evaluate(expression, context)?);

            let consumed = start + OPEN.len() + end + CLOSE.len();
            offset += consumed;
            rest = &rest[consumed..];
        }

        output.push_str(rest);
        Ok(output)
    }
}

#[derive(Debug)]
enum Filter {
    Lower,
    Upper,
    Truncate(usize),
    Default(String),
    Json,
}

fn parse_filter(raw: &str) -> Result<Filter, TemplateError> {
    let raw = raw.trim();
    let caps = FILTER
        .captures(raw)
        .ok_or_else(|| TemplateError::UnknownFilter(raw.to_string()))?;
    let name = &caps["name"];
    let arg = caps.name("arg").map(|m| unquote(m.as_str()));

    match (name, arg) {
        ("lower", None) => Ok(Filter::Lower),
        ("upper", None) => Ok(Filter::Upper),
        ("json", None) => Ok(Filter::Json),
        ("truncate", Some(n)) => n.parse().map(Filter::Truncate).map_err(|_| {
            TemplateError::InvalidFilterArgument {
                filter: "truncate".to_string(),
                reason: format!("expected a character count, got '{}'", n),
            }
        }),
        ("default", Some(fallback)) => Ok(Filter::Default(fallback.to_string())),
        ("lower" | "upper" | "json", Some(_)) | ("truncate" | "default", None) => {
            Err(TemplateError::InvalidFilterArgument {
                filter: name.to_string(),
                reason: "wrong number of arguments".to_string(),
            })
        }
        _ => Err(TemplateError::UnknownFilter(name.to_string())),
    }
}

fn unquote(arg: &str) -> &str {
    let quoted = arg.len() >= 2
        && ((arg.starts_with('"') && arg.ends_with('"'))
            || (arg.starts_with('\'') && arg.ends_with('\'')));
    if quoted {
        &arg[1..arg.len() - 1]
    } else {
        arg
    }
}

fn evaluate(expression: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let mut parts = expression.split('|');
    let path = parts.next().unwrap_or_default().trim();
    let filters = parts.map(parse_filter).collect::<Result<Vec<_>, _>>()?;
    let has_default = filters.iter().any(|f| matches!(f, Filter::Default(_)));

    let value = match lookup(path, context) {
        Ok(value) => value,
        Err(TemplateError::UnknownAttribute { .. }) if has_default => Value::Null,
        Err(e) => return Err(e),
    };

    let mut text = display(&value);
    for filter in &filters {
        text = match filter {
            Filter::Lower => text.to_lowercase(),
            Filter::Upper => text.to_uppercase(),
            Filter::Truncate(max) => text.chars().take(*max).collect(),
            Filter::Default(fallback) if text.is_empty() => fallback.clone(),
            Filter::Default(_) => text,
            Filter::Json => Value::String(text).to_string(),
        };
    }
    Ok(text)
}

fn lookup(path: &str, context: &TemplateContext) -> Result<Value, TemplateError> {
    let mut segments = path.split('.');
    let root = segments.next().unwrap_or_default();
    if !PATH_SEGMENT.is_match(root) {
        return Err(TemplateError::UnknownVariable(root.to_string()));
    }

    let mut current = context
        .get(root)
        .ok_or_else(|| TemplateError::UnknownVariable(root.to_string()))?;
    let mut walked = root.to_string();

    for segment in segments {
        let next = if PATH_SEGMENT.is_match(segment) {
            match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
        } else {
            None
        };

        current = next.ok_or_else(|| TemplateError::UnknownAttribute {
            path: walked.clone(),
            attribute: segment.to_string(),
        })?;
        walked.push('.');
        walked.push_str(segment);
    }

    Ok(current.clone())
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string()
        }
    }
}
