//! Unified error type for the codeatlas-ir crate
//!
//! Categorized error kinds matching the pipeline layers, with optional
//! file/line context and source-error chaining.

use std::fmt;
use thiserror::Error;

/// Error kind categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input at session start (missing repo id, unreadable path, bad rule file)
    Validation,
    /// Per-file parse failure (recoverable; file is skipped)
    Parse,
    /// Structural IR generation errors
    IrGeneration,
    /// Control-flow construction errors
    FlowGraph,
    /// Data-flow construction errors
    DataFlow,
    /// Type enrichment / LSP transport errors (degraded, not fatal)
    TypeEnrichment,
    /// Cross-file resolution errors
    CrossFile,
    /// Taint analysis errors
    Taint,
    /// Query execution errors
    Query,
    /// Retrieval / fusion errors
    Retrieval,
    /// Cache or persisted-state IO errors
    Storage,
    /// Configuration errors
    Config,
    /// An IR invariant was violated after a layer ran (a bug; aborts the session)
    Consistency,
    /// The session was asked to stop (not an error for callers)
    Cancelled,
    /// Internal errors (bugs)
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Parse => "parse",
            ErrorKind::IrGeneration => "ir_generation",
            ErrorKind::FlowGraph => "flow_graph",
            ErrorKind::DataFlow => "data_flow",
            ErrorKind::TypeEnrichment => "type_enrichment",
            ErrorKind::CrossFile => "cross_file",
            ErrorKind::Taint => "taint",
            ErrorKind::Query => "query",
            ErrorKind::Retrieval => "retrieval",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
            ErrorKind::Consistency => "consistency",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}{}", context_suffix(.file_path, .line))]
pub struct CodeatlasError {
    pub kind: ErrorKind,
    pub message: String,
    pub file_path: Option<String>,
    pub line: Option<u32>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn context_suffix(file_path: &Option<String>, line: &Option<u32>) -> String {
    match (file_path, line) {
        (Some(f), Some(l)) => format!(" in {}:{}", f, l),
        (Some(f), None) => format!(" in {}", f),
        _ => String::new(),
    }
}

impl CodeatlasError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file_path: None,
            line: None,
            source: None,
        }
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn ir_generation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IrGeneration, message)
    }

    pub fn flow_graph(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FlowGraph, message)
    }

    pub fn data_flow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataFlow, message)
    }

    pub fn type_enrichment(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeEnrichment, message)
    }

    pub fn cross_file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CrossFile, message)
    }

    pub fn taint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Taint, message)
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Query, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Consistency, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "session stopped")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<serde_json::Error> for CodeatlasError {
    fn from(err: serde_json::Error) -> Self {
        CodeatlasError::storage(format!("JSON serialization error: {}", err)).with_source(err)
    }
}

impl From<serde_yaml::Error> for CodeatlasError {
    fn from(err: serde_yaml::Error) -> Self {
        CodeatlasError::config(format!("YAML error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for CodeatlasError {
    fn from(err: std::io::Error) -> Self {
        CodeatlasError::storage(format!("IO error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CodeatlasError>;
