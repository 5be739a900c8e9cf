//! Template engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template registered under this name
    #[error("Template not found: {0}")]
    NotFound(String),

    /// A template failed to parse or its inheritance chain is broken
    #[error("Failed to load templates: {0}")]
    LoadError(String),

    /// Rendering failed, usually a missing variable or filter error
    #[error("Failed to render '{template}': {message}")]
    RenderError { template: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
