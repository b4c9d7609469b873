use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No valid session found")]
    NoSession,

    #[error("Authentication failed - please log in again (401): {0}")]
    Unauthorized(String),

    #[error("Access denied - insufficient permissions (403): {0}")]
    AccessDenied(String),

    #[error("Server error - please try again later ({status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("API Error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(body),
            403 => ApiError::AccessDenied(body),
            code @ 500..=599 => ApiError::ServerError { status: code, body },
            code => ApiError::Status { status: code, body },
        }
    }
}
