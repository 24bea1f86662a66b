//! MIME type detection and matching.

use std::path::Path;

/// Normalize a MIME type for comparison (strip parameters, lowercase).
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_lowercase()
}

/// Check whether a MIME pattern matches a MIME type.
///
/// `*` and `*/*` match everything, `type/*` matches any subtype,
/// anything else must match exactly (parameters and case ignored).
pub fn mimetype_matches(pattern: &str, mimetype: &str) -> bool {
    if pattern == "*" || pattern == "*/*" {
        return true;
    }
    let mimetype = normalize_mime(mimetype);
    let pattern = normalize_mime(pattern);
    if let Some(prefix) = pattern.strip_suffix("/*") {
        mimetype
            .split_once('/')
            .is_some_and(|(kind, _)| kind == prefix)
    } else {
        pattern == mimetype
    }
}

/// Detect the MIME type of a file from its content, falling back to the
/// extension and finally to `application/octet-stream`.
pub fn detect_mime_type(path: &Path, content: &[u8]) -> String {
    // Read first 8KB for magic byte detection
    let head = &content[..content.len().min(8192)];
    if let Some(detected) = infer::get(head) {
        return detected.mime_type().to_string();
    }

    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
