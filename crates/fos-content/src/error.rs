//! Content errors

use crate::content::{Operation, Status};
use crate::ResourceId;

/// Content subsystem error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentError {
    #[error("No handler for content type: {0}")]
    UnsupportedType(String),

    #[error("Content type registered twice: {0}")]
    DuplicateType(String),

    #[error("Cannot {op} content with status {status}")]
    InvalidState { op: Operation, status: Status },

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Content already cached: {0}")]
    DuplicateEntry(ResourceId),

    #[error("Content has been destroyed")]
    Destroyed,

    #[error("Content is already borrowed")]
    Busy,

    #[error("Image error: {0}")]
    Image(#[from] fos_render::ImageError),

    #[error("HTML error: {0}")]
    Html(#[from] fos_html::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ContentError>;
