use thiserror::Error;

/// Application-wide error types for Demeter.
#[derive(Error, Debug)]
pub enum AppError {
    /// Navigation to a source page failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The page loaded but could not be rendered/read.
    #[error("Render error: {0}")]
    RenderError(String),

    /// An attempt exceeded its time budget.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Session creation or handle borrow failed.
    #[error("Session pool error: {0}")]
    PoolError(String),

    /// Reading or writing the result dataset failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// CSV encoding/decoding failed.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AppError::Timeout(30).to_string(),
            "Request timed out after 30 seconds"
        );
        assert_eq!(
            AppError::PoolError("browser gone".into()).to_string(),
            "Session pool error: browser gone"
        );
        assert_eq!(AppError::Generic("boom".into()).to_string(), "boom");
    }
}
