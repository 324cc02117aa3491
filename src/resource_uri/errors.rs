use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceUriError {
    #[error("Unknown resource `{segment}` in `{uri}` (not a registered relation)")]
    UnknownResource { segment: String, uri: String },
    #[error("Malformed item key `{segment}` in `{uri}` (row keys must be decimal integers)")]
    MalformedItemKey { segment: String, uri: String },
    #[error("Malformed resource identifier `{uri}`: {reason}")]
    Malformed { uri: String, reason: String },
}

impl ResourceUriError {
    pub fn malformed(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        ResourceUriError::Malformed {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}
