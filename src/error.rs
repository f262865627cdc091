//! Error taxonomy for the extraction engine.
//!
//! The recoverable variants carry a human message plus a structured context
//! map. I/O errors are fatal: they are wrapped unchanged and every component
//! boundary re-raises them instead of converting them into a recoverable
//! variant.

use std::collections::HashMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KreuzbergError>;

/// Structured context attached to recoverable errors.
pub type ErrorContext = HashMap<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum KreuzbergError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {message}")]
    Validation { message: String, context: ErrorContext },

    #[error("Parsing error: {message}")]
    Parsing { message: String, context: ErrorContext },

    #[error("OCR error: {message}")]
    Ocr { message: String, context: ErrorContext },

    #[error("Missing dependency: {message}")]
    MissingDependency { message: String, context: ErrorContext },

    #[error("Memory limit exceeded: {message}")]
    MemoryLimit { message: String, context: ErrorContext },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin { message: String, plugin_name: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Other(String),
}

impl KreuzbergError {
    pub fn validation(message: impl Into<String>) -> Self {
        KreuzbergError::Validation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn parsing(message: impl Into<String>) -> Self {
        KreuzbergError::Parsing {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn ocr(message: impl Into<String>) -> Self {
        KreuzbergError::Ocr {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn missing_dependency(message: impl Into<String>) -> Self {
        KreuzbergError::MissingDependency {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn memory_limit(message: impl Into<String>) -> Self {
        KreuzbergError::MemoryLimit {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        KreuzbergError::Cache(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        KreuzbergError::Serialization(message.into())
    }

    /// Attach a context entry to a recoverable error. No-op for fatal and
    /// string-only variants.
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let Some(context) = self.context_mut() {
            context.insert(key.into(), value);
        }
        self
    }

    /// Structured context of the error, if the variant carries one.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            KreuzbergError::Validation { context, .. }
            | KreuzbergError::Parsing { context, .. }
            | KreuzbergError::Ocr { context, .. }
            | KreuzbergError::MissingDependency { context, .. }
            | KreuzbergError::MemoryLimit { context, .. } => Some(context),
            _ => None,
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            KreuzbergError::Validation { context, .. }
            | KreuzbergError::Parsing { context, .. }
            | KreuzbergError::Ocr { context, .. }
            | KreuzbergError::MissingDependency { context, .. }
            | KreuzbergError::MemoryLimit { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Fatal errors must propagate unchanged through every component
    /// boundary; only recoverable errors may be converted into batch error
    /// results or degraded metadata.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KreuzbergError::Io(_))
    }

    /// Stable error-kind label used in batch error metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            KreuzbergError::Io(_) => "io",
            KreuzbergError::Validation { .. } => "validation",
            KreuzbergError::Parsing { .. } => "parsing",
            KreuzbergError::Ocr { .. } => "ocr",
            KreuzbergError::MissingDependency { .. } => "missing_dependency",
            KreuzbergError::MemoryLimit { .. } => "memory_limit",
            KreuzbergError::Cache(_) => "cache",
            KreuzbergError::Serialization(_) => "serialization",
            KreuzbergError::Plugin { .. } => "plugin",
            KreuzbergError::UnsupportedFormat(_) => "unsupported_format",
            KreuzbergError::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for KreuzbergError {
    fn from(err: serde_json::Error) -> Self {
        KreuzbergError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for KreuzbergError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        KreuzbergError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for KreuzbergError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        KreuzbergError::Serialization(err.to_string())
    }
}

#[cfg(feature = "excel")]
impl From<calamine::Error> for KreuzbergError {
    fn from(err: calamine::Error) -> Self {
        KreuzbergError::parsing(err.to_string())
    }
}
