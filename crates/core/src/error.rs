use std::time::Duration;

/// Failure of a content generation request.
///
/// This is the only error that reaches the learner: the coordinator turns it
/// into banner text and the form stays available for another attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("could not reach the content service: {0}")]
    Transport(String),
    #[error("the content service returned an error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("the content service did not answer within {0:?}")]
    Timeout(Duration),
    #[error("the content service returned malformed content: {0}")]
    Malformed(String),
    #[error("the content service returned no content")]
    Empty,
}

/// Failure of an illustration request. Never shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageGenerationError {
    #[error("illustration request failed: {0}")]
    Request(String),
    #[error("illustration service returned no image")]
    NoImage,
    #[error("illustration payload could not be decoded: {0}")]
    Decode(String),
}

/// Failure reported by the speech engine for a single utterance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("speech engine failed on chunk {chunk}: {reason}")]
pub struct SpeechPlaybackError {
    pub chunk: usize,
    pub reason: String,
}

/// Input rejected at the form boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("a topic is required")]
    EmptyTopic,
    #[error("unknown class '{0}', expected Class 1 to Class 7")]
    UnknownClass(String),
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),
    #[error("unsupported language '{0}'")]
    UnknownLanguage(String),
}

/// Why a submission was not started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a story is already being created")]
    Busy,
}
