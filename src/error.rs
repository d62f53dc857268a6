//! Central error handling for the viewer engine.
//!
//! Provides a unified ViewError enum with consistent categorization across
//! grid, projection, rendering and readback failures.

/// Centralized error type for all viewer operations
#[derive(thiserror::Error, Debug)]
pub enum ViewError {
    #[error("Grid error: {0}")]
    Grid(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewError {
    /// Convenience constructors for common error types
    pub fn grid<T: ToString>(msg: T) -> Self {
        ViewError::Grid(msg.to_string())
    }

    pub fn projection<T: ToString>(msg: T) -> Self {
        ViewError::Projection(msg.to_string())
    }

    pub fn render<T: ToString>(msg: T) -> Self {
        ViewError::Render(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        ViewError::Readback(msg.to_string())
    }
}

/// Result type alias for viewer operations
pub type ViewResult<T> = Result<T, ViewError>;
