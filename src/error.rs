use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Accord
#[derive(Error, Debug)]
pub enum AccordError {
    /// Database-related errors (vector collections and the SQL tool database)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Text extraction or DOC conversion failures
    #[error("Extraction error: {0}")]
    Extract(String),

    /// A source directory without its manifest file
    #[error("Manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    /// Collection not found on disk
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Language model API errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// SQL agent errors (bad statement, no SQL in model output, iteration limit)
    #[error("SQL agent error: {0}")]
    Sql(String),

    /// Tool registration or invocation errors
    #[error("Tool error: {0}")]
    Tool(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using AccordError
pub type Result<T> = std::result::Result<T, AccordError>;
