//! Error types for ScopeForge Core
//!
//! Refinement never surfaces these to its caller (every refinement failure is
//! converted into a safe default), but validation, knowledge-base IO and model
//! output parsing do.

use thiserror::Error;

/// Result type alias for ScopeForge operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Main error type for ScopeForge operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// Scope document failed boundary validation
    #[error("Invalid scope: {0}")]
    Validation(#[from] ValidationError),

    /// Model output could not be turned into structured data
    #[error("Model output error: {0}")]
    ModelOutput(String),

    /// The text generator failed or timed out
    #[error("Text generation failed: {0}")]
    Generation(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<ScopeError>,
    },
}

/// Hard validation failures of a scope document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("phase '{0}' has a duration of zero weeks")]
    ZeroDurationPhase(String),

    #[error("activity '{0}' has zero effort days")]
    ZeroEffortActivity(String),

    #[error("activity '{activity}' has {days} effort days (limit {limit})")]
    EffortTooLarge {
        activity: String,
        days: u32,
        limit: u32,
    },

    #[error("timeline of {weeks} weeks exceeds the {limit}-week limit")]
    TimelineTooLong { weeks: u64, limit: u32 },

    #[error("resource '{role}' has allocation {value}% (must be 0-100)")]
    AllocationOutOfRange { role: String, value: u32 },

    #[error("resource '{role}' has invalid {field}: {value}")]
    InvalidAmount {
        role: String,
        field: &'static str,
        value: f64,
    },

    #[error("resource role '{0}' appears more than once")]
    DuplicateRole(String),

    #[error("contingency percentage {0} is invalid")]
    InvalidContingency(f64),
}

impl ScopeError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
