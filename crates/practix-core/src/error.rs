//! Error types for practix-core
//!
//! Provides the query error taxonomy plus load reporting for graceful
//! degradation while importing the corpus.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Core error type for practix operations
///
/// `Clone` so that every waiter attached to a single in-flight computation
/// receives the same error value.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    // ===================
    // Query Errors (surfaced to clients)
    // ===================
    #[error("Category not found: {category_id}")]
    CategoryNotFound { category_id: String },

    #[error("Invalid sort '{value}': expected one of quality, relevance, difficulty, title")]
    InvalidSort { value: String },

    #[error("Invalid page: {reason}")]
    InvalidPage { reason: String },

    #[error("Invalid filter '{param}': {value}")]
    InvalidFilter { param: String, value: String },

    #[error("Service unavailable: {operation}")]
    ServiceUnavailable { operation: String },

    // ===================
    // Backing Store Errors
    // ===================
    #[error("Backing store timed out after {}ms: {operation}", .timeout.as_millis())]
    BackingStoreTimeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Backing store task failed: {message}")]
    BackingStoreFailed { message: String },

    // ===================
    // Shared Cache Errors (never surfaced, logged and treated as a miss)
    // ===================
    #[error("Shared cache unavailable: {message}")]
    SharedCacheUnavailable { message: String },

    // ===================
    // Corpus Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to parse JSON in {path}: {message}")]
    JsonParse { path: PathBuf, message: String },

    #[error("Corpus declares {count} categories, at most {max} are supported")]
    TooManyCategories { count: usize, max: usize },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ===================
    // Client Errors
    // ===================
    #[error("Server error ({status}): {message}")]
    Remote { status: u16, message: String },
}

impl CoreError {
    pub fn category_not_found(category_id: impl Into<String>) -> Self {
        CoreError::CategoryNotFound {
            category_id: category_id.into(),
        }
    }

    pub fn invalid_page(reason: impl Into<String>) -> Self {
        CoreError::InvalidPage {
            reason: reason.into(),
        }
    }

    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::FileRead {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Worth retrying (by the store accessor or by a client)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::ServiceUnavailable { .. } | CoreError::BackingStoreTimeout { .. }
        )
    }

    /// Input validation failure, reported before any backing store call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidSort { .. }
                | CoreError::InvalidPage { .. }
                | CoreError::InvalidFilter { .. }
        )
    }

    /// Stable machine-readable kind, used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::CategoryNotFound { .. } => "category_not_found",
            CoreError::InvalidSort { .. } => "invalid_sort",
            CoreError::InvalidPage { .. } => "invalid_page",
            CoreError::InvalidFilter { .. } => "invalid_filter",
            CoreError::ServiceUnavailable { .. } | CoreError::BackingStoreTimeout { .. } => {
                "service_unavailable"
            }
            _ => "internal",
        }
    }
}

impl From<practix_types::ParamError> for CoreError {
    fn from(err: practix_types::ParamError) -> Self {
        match err.param {
            "sort" | "order" => CoreError::InvalidSort { value: err.value },
            param => CoreError::InvalidFilter {
                param: param.to_string(),
                value: err.value,
            },
        }
    }
}

/// Severity level for errors during load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical, can continue with degraded functionality
    Warning,
    /// Significant but not fatal
    Error,
    /// Cannot continue
    Fatal,
}

/// Individual error entry in load report
#[derive(Debug, Clone)]
pub struct LoadError {
    pub source: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

impl LoadError {
    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Warning,
        }
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Error,
        }
    }

    pub fn fatal(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Fatal,
        }
    }
}

/// Report of errors encountered while importing the corpus
///
/// Tracks partial failures instead of failing the whole import on the first
/// malformed line.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub errors: Vec<LoadError>,
    pub categories_loaded: usize,
    pub files_scanned: usize,
    pub items_loaded: usize,
    pub items_skipped: usize,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: LoadError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.errors.push(LoadError::warning(source, message));
    }

    pub fn add_fatal(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.errors.push(LoadError::fatal(source, message));
    }

    /// Returns true if there are any fatal errors
    pub fn has_fatal_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.severity == ErrorSeverity::Fatal)
    }

    /// Returns true if there are any errors (including warnings)
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns count by severity
    pub fn error_count(&self) -> (usize, usize, usize) {
        let count = |severity| self.errors.iter().filter(|e| e.severity == severity).count();
        (
            count(ErrorSeverity::Warning),
            count(ErrorSeverity::Error),
            count(ErrorSeverity::Fatal),
        )
    }
}

/// Degraded state indicator for the corpus store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedState {
    /// Everything loaded successfully
    Healthy,
    /// Some items were skipped but the catalog is usable
    PartialData { skipped: usize, reason: String },
    /// Import failed; serving the previous snapshot (or nothing)
    ReadOnly { reason: String },
}

impl DegradedState {
    pub fn from_report(report: &LoadReport) -> Self {
        if report.has_fatal_errors() {
            let reason = report
                .errors
                .iter()
                .find(|e| e.severity == ErrorSeverity::Fatal)
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Fatal errors during load".to_string());
            return DegradedState::ReadOnly { reason };
        }

        if report.items_skipped > 0 || report.has_errors() {
            DegradedState::PartialData {
                skipped: report.items_skipped,
                reason: format!(
                    "{} items skipped, {} load issues",
                    report.items_skipped,
                    report.errors.len()
                ),
            }
        } else {
            DegradedState::Healthy
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DegradedState::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        !self.is_healthy()
    }
}

impl std::fmt::Display for DegradedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradedState::Healthy => f.write_str("healthy"),
            DegradedState::PartialData { reason, .. } => write!(f, "partial data ({})", reason),
            DegradedState::ReadOnly { reason } => write!(f, "read-only ({})", reason),
        }
    }
}
