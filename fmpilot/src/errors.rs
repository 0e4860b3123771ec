use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Element is detached from the UI tree: {0}")]
    ElementDetached(String),

    #[error("Element is not enabled: {0}")]
    ElementNotEnabled(String),

    #[error("Target dialog not found: {0}")]
    DialogNotFound(String),

    #[error("Field not found in list: {0}")]
    FieldNotFound(String),

    /// The application refused an edit because the name is already taken.
    /// Batches stop at this error.
    #[error("Duplicate field name rejected by application: {0}")]
    DuplicateName(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AutomationError {
    /// Errors that should stop the remaining items of a batch.
    pub fn aborts_batch(&self) -> bool {
        matches!(self, AutomationError::DuplicateName(_))
    }
}
