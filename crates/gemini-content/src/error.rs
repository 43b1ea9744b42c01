use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("failed to send request: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Gemini API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("response was blocked: {0}")]
    Blocked(String),
    #[error("response contained no candidates")]
    NoCandidates,
    #[error("response contained no image")]
    NoImage,
    #[error("image data is not valid base64: {0}")]
    InvalidImage(#[from] base64::DecodeError),
}
