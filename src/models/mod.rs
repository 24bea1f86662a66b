//! Data models for filemeta.

mod document_file;

pub use document_file::DocumentFile;
