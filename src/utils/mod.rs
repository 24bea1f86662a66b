//! Utility functions.

pub mod mime;

pub use mime::{detect_mime_type, mimetype_matches, normalize_mime};
