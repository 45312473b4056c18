use thiserror::Error;

/// Main error type for CodeScribe
#[derive(Error, Debug)]
pub enum CodescribeError {
    /// Database-related errors (persisted vector store)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cloning or workspace errors
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Errors walking or reading the cloned tree
    #[error("Load error: {0}")]
    Load(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Vector store build errors
    #[error("Index error: {0}")]
    Index(String),

    /// Text generation errors
    #[error("Language model error: {0}")]
    LanguageModel(String),

    /// No vector store has been built yet
    #[error("No repository has been analyzed yet.")]
    NotReady,

    /// Another analysis holds the analysis lock
    #[error("A repository analysis is already in progress. Try again when it finishes.")]
    Busy,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using CodescribeError
pub type Result<T> = std::result::Result<T, CodescribeError>;
