//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type SiftResult<T> = Result<T, SiftError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the Sift system
#[derive(Error, Debug)]
pub enum SiftError {
    /// Search provider failed or returned garbage; retried, never session-fatal
    #[error("Search error: {message}")]
    Search {
        message: String,
        query: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// Text generation failed or produced nothing usable
    #[error("Text generation error: {message}")]
    TextGeneration {
        message: String,
        provider: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("Operation cancelled: {operation}")]
    Cancelled {
        operation: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl SiftError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SiftError::Search { context, .. } => Some(context),
            SiftError::TextGeneration { context, .. } => Some(context),
            SiftError::Validation { context, .. } => Some(context),
            SiftError::Config { context, .. } => Some(context),
            SiftError::Timeout { context, .. } => Some(context),
            SiftError::Cancelled { context, .. } => Some(context),
            SiftError::Internal { context, .. } => Some(context),
            SiftError::Io(_) | SiftError::Serialization(_) => None,
        }
    }

    /// Whether retrying the same call can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            SiftError::Search { .. } => true,
            SiftError::Timeout { .. } => true,
            SiftError::TextGeneration { .. } => true,
            SiftError::Config { .. } => false,
            SiftError::Validation { .. } => false,
            SiftError::Cancelled { .. } => false,
            _ => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SiftError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            SiftError::Config { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration error"
                );
            }
            SiftError::Validation { .. } => {
                debug!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Validation failure, item dropped"
                );
            }
            SiftError::Search { .. }
            | SiftError::Timeout { .. }
            | SiftError::TextGeneration { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Provider or timeout error (may be recoverable)"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! search_error {
    ($msg:expr, $component:expr) => {
        $crate::SiftError::Search {
            message: $msg.to_string(),
            query: None,
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $query:expr) => {
        $crate::SiftError::Search {
            message: $msg.to_string(),
            query: Some($query.to_string()),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check search provider availability"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::SiftError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
    ($msg:expr, $component:expr, $suggestion:expr) => {
        $crate::SiftError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component).with_suggestion($suggestion),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::SiftError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
