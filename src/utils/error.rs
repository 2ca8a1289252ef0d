use thiserror::Error;

/// Message reported when no three-line MRZ block exists in the OCR text.
pub const MRZ_NOT_FOUND: &str = "Valid MRZ block not found";

/// Failures raised by a recognition backend. None of them are retried.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Recognition service unreachable: {0}")]
    Unreachable(String),
    #[error("Recognition service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed recognition response: {0}")]
    Malformed(String),
    #[error("Recognition service error: {0}")]
    Service(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Failed to encode image for recognition: {0}")]
    Encode(String),
    #[error("Recognition backend unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid recognition request: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to decode photo: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("{}", MRZ_NOT_FOUND)]
    NotFound,
}

impl From<image::ImageError> for ScanError {
    fn from(err: image::ImageError) -> Self {
        ScanError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            BackendError::Request(err.to_string())
        } else if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Unreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        assert_eq!(ScanError::NotFound.to_string(), "Valid MRZ block not found");
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let err: ScanError = BackendError::Service("quota exceeded".to_string()).into();
        assert_eq!(err.to_string(), "Recognition service error: quota exceeded");
    }
}
