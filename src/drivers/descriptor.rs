//! Static registration metadata for driver variants.

use serde::Serialize;

use crate::utils::mimetype_matches;

/// Describes a driver variant. One per driver, fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverDescriptor {
    /// Unique registry key.
    pub internal_name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    /// Whether new configurations of this driver start enabled.
    pub enabled: bool,
    /// MIME patterns this driver applies to (`*` for all).
    pub mime_types: &'static [&'static str],
    /// Configuration keys the driver accepts, in display order.
    pub argument_names: &'static [&'static str],
    /// Literal defaults the driver declares for its own arguments.
    pub default_arguments: &'static [(&'static str, &'static str)],
}

impl DriverDescriptor {
    pub fn supports_mime_type(&self, mime_type: &str) -> bool {
        self.mime_types
            .iter()
            .any(|pattern| mimetype_matches(pattern, mime_type))
    }

    pub fn accepts_argument(&self, name: &str) -> bool {
        self.argument_names.iter().any(|argument| *argument == name)
    }

    pub fn builtin_default(&self, name: &str) -> Option<&'static str> {
        self.default_arguments
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}
