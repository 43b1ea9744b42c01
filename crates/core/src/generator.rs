use crate::content::{ContentPayload, ImageAsset};
use crate::error::{GenerationError, ImageGenerationError};
use crate::request::LearningRequest;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

// The coordinator only sees this trait, so tests drive it with `MockContentGenerator`
// and the service plugs in whichever provider adapter it was configured with.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generates the story, quiz, takeaways and metadata for a request.
    /// A single attempt is made.
    async fn request_content(
        &self,
        request: &LearningRequest,
    ) -> Result<ContentPayload, GenerationError>;

    /// Generates an illustration for the story.
    async fn request_illustration(
        &self,
        image_prompt: &str,
    ) -> Result<ImageAsset, ImageGenerationError>;
}
