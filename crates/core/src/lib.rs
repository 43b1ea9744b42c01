pub mod content;
pub mod coordinator;
pub mod error;
pub mod generator;
pub mod narration;
pub mod quiz;
pub mod request;
pub mod speech;
pub mod view;

pub use content::{ContentPayload, ImageAsset, OptionLetter, QuizItem, ScoringModel};
pub use coordinator::{AppState, Coordinator, Illustration, Phase};
pub use error::{
    GenerationError, ImageGenerationError, SpeechPlaybackError, SubmitError, ValidationError,
};
pub use generator::ContentGenerator;
pub use request::{ClassGrade, Language, LearningForm, LearningRequest, Subject};
