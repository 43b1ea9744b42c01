use async_trait::async_trait;
use gemini_content::{GeminiClient, GeminiError};
use learn_tales_core::content::{ContentPayload, ImageAsset};
use learn_tales_core::error::{GenerationError, ImageGenerationError};
use learn_tales_core::generator::ContentGenerator;
use learn_tales_core::request::LearningRequest;
use serde_json::{Value, json};

/// An adapter that implements the `ContentGenerator` trait on top of the Gemini REST client.
pub struct GeminiAdapter {
    client: GeminiClient,
    system_instruction: String,
}

impl GeminiAdapter {
    pub fn new(client: GeminiClient, system_instruction: String) -> Self {
        Self {
            client,
            system_instruction,
        }
    }
}

#[async_trait]
impl ContentGenerator for GeminiAdapter {
    async fn request_content(
        &self,
        request: &LearningRequest,
    ) -> Result<ContentPayload, GenerationError> {
        let text = self
            .client
            .generate_json(
                &self.system_instruction,
                &user_prompt(request),
                response_schema(),
            )
            .await
            .map_err(generation_error)?;
        tracing::debug!(bytes = text.len(), "content response received");
        ContentPayload::from_json(&text)
    }

    async fn request_illustration(
        &self,
        image_prompt: &str,
    ) -> Result<ImageAsset, ImageGenerationError> {
        let image = self
            .client
            .generate_image(image_prompt)
            .await
            .map_err(image_error)?;
        Ok(ImageAsset::new(image.mime_type, image.bytes))
    }
}

/// The user turn naming what to generate. The system instruction carries the format.
pub fn user_prompt(request: &LearningRequest) -> String {
    format!(
        "class_grade: {class}\nsubject: {subject}\ntopic: {topic}\nlanguage: {language}\n\n\
         Create the story, quiz, takeaways, scoring model and image prompt for this topic. \
         Every text field must be written in {language}.",
        class = request.class_grade,
        subject = request.subject,
        topic = request.topic,
        language = request.language,
    )
}

/// Schema for the structured response, in the API's OpenAPI subset.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "story": {
                "type": "STRING",
                "description": "A 400-600 word narrative explaining the topic as an age-appropriate story."
            },
            "quiz": {
                "type": "ARRAY",
                "description": "Five multiple-choice questions about the story.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": {"type": "STRING"},
                        "options": {
                            "type": "ARRAY",
                            "description": "Four options, in order A, B, C, D.",
                            "items": {"type": "STRING"}
                        },
                        "correctAnswer": {
                            "type": "STRING",
                            "description": "The letter of the correct option: A, B, C or D."
                        },
                        "explanation": {
                            "type": "STRING",
                            "description": "A short explanation of the correct answer."
                        }
                    },
                    "required": ["question", "options", "correctAnswer", "explanation"]
                }
            },
            "takeaways": {
                "type": "ARRAY",
                "description": "Three to five short points summarising what was learned.",
                "items": {"type": "STRING"}
            },
            "scoringModel": {
                "type": "OBJECT",
                "properties": {
                    "class_level": {"type": "STRING"},
                    "subject": {"type": "STRING"},
                    "topic": {"type": "STRING"},
                    "expected_quiz_score": {"type": "INTEGER"},
                    "difficulty": {"type": "STRING"},
                    "tags": {"type": "ARRAY", "items": {"type": "STRING"}}
                },
                "required": ["class_level", "subject", "topic", "expected_quiz_score", "difficulty", "tags"]
            },
            "image_prompt": {
                "type": "STRING",
                "description": "A short prompt for an image model capturing the story's characters and setting."
            }
        },
        "required": ["story", "quiz", "takeaways", "scoringModel", "image_prompt"]
    })
}

fn generation_error(error: GeminiError) -> GenerationError {
    match error {
        GeminiError::Http(e) => GenerationError::Transport(e.to_string()),
        GeminiError::Timeout(after) => GenerationError::Timeout(after),
        GeminiError::Api { status, message } => GenerationError::Api { status, message },
        GeminiError::Decode(reason) => GenerationError::Malformed(reason),
        GeminiError::Blocked(reason) => {
            GenerationError::Malformed(format!("response was blocked ({reason})"))
        }
        GeminiError::NoCandidates => GenerationError::Empty,
        other => GenerationError::Malformed(other.to_string()),
    }
}

fn image_error(error: GeminiError) -> ImageGenerationError {
    match error {
        GeminiError::NoImage => ImageGenerationError::NoImage,
        GeminiError::InvalidImage(e) => ImageGenerationError::Decode(e.to_string()),
        other => ImageGenerationError::Request(other.to_string()),
    }
}
