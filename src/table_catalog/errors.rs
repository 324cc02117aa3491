use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No relation registered for `{segment}`")]
    UnknownRelation { segment: String },
    #[error("Relation `{base}` declares no join reference to expand target `{expand}`")]
    UnknownExpand { base: String, expand: String },
    #[error("Failed to read catalog configuration: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse catalog configuration: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid catalog configuration: {message}")]
    InvalidConfig { message: String },
}

impl CatalogError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CatalogError::InvalidConfig {
            message: message.into(),
        }
    }
}
