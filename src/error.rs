//! Error types for the xlsxstream library

use thiserror::Error;

/// Result type alias for xlsxstream operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all writer operations
///
/// Every error aborts the operation that produced it and leaves the writer
/// unusable. ZIP framing and XML parts are forward-only, so callers should
/// discard both the writer and its output sink.
#[derive(Error, Debug)]
pub enum ExcelError {
    /// Operation is not valid in the writer's current state
    #[error("Invalid call sequence: {0}")]
    Sequence(String),

    /// A format limit was crossed (rows, columns, sheet names, ZIP sizes)
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// A value could not be encoded (hyperlink target, picture, anchor, number)
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO failure from the underlying byte sink
    #[error("Sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl ExcelError {
    pub(crate) fn sequence(msg: impl Into<String>) -> Self {
        ExcelError::Sequence(msg.into())
    }

    pub(crate) fn limit(msg: impl Into<String>) -> Self {
        ExcelError::LimitExceeded(msg.into())
    }

    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        ExcelError::Encoding(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_to_sink() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: ExcelError = io.into();
        assert!(matches!(err, ExcelError::Sink(_)));
        assert!(err.to_string().starts_with("Sink error"));
    }
}
