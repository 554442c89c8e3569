use thiserror::Error;

/// Errors produced by the vectime query compiler and execution backends.
///
/// The variants separate problems the caller can fix (`Config`,
/// `MalformedInput`, `UnsupportedCombination`) from failures reported by the
/// database itself (`Database`), which are the only class where a retry can
/// ever make sense.
#[derive(Debug, Error)]
pub enum VectimeError {
    /// Invalid table or client configuration, raised at construction time.
    #[error("config error: {0}")]
    Config(String),
    /// Malformed caller input, raised synchronously at query-compile time.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// A valid option combined with a configuration it cannot serve.
    #[error("unsupported combination: {0}")]
    UnsupportedCombination(String),
    /// An error surfaced unchanged from the database driver.
    #[error("database error: {0}")]
    Database(String),
}
