use crate::content::ContentPayload;
use crate::narration::NarrationController;
use crate::quiz::{AnswerFeedback, COMPLETION_SETTLE_DELAY, QuizSession, QuizSummary};
use crate::request::Language;
use crate::speech::SpeechEngine;
use std::sync::Arc;
use std::time::Duration;

/// The result page for one payload: the story with its read-aloud controls,
/// then the quiz once asked for, then the takeaways once the quiz is done.
pub struct ResultView {
    payload: Arc<ContentPayload>,
    narration: Option<NarrationController>,
    quiz: Option<QuizSession>,
    takeaways_revealed: bool,
    settle_delay: Duration,
}

impl ResultView {
    /// Must be called inside a tokio runtime when `engine` is present.
    pub fn new(
        payload: Arc<ContentPayload>,
        engine: Option<Arc<dyn SpeechEngine>>,
        language: Language,
    ) -> Self {
        let narration = NarrationController::attach(engine, &payload.narrative, language);
        Self {
            payload,
            narration,
            quiz: None,
            takeaways_revealed: false,
            settle_delay: COMPLETION_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Shows a new payload in place of the current one. Narration for the
    /// old story stops, and the quiz and takeaways are hidden again.
    pub fn load(&mut self, payload: Arc<ContentPayload>, language: Language) {
        if let Some(narration) = self.narration.as_mut() {
            narration.replace_narrative(&payload.narrative, language);
        }
        self.payload = payload;
        self.quiz = None;
        self.takeaways_revealed = false;
    }

    pub fn payload(&self) -> &ContentPayload {
        &self.payload
    }

    pub fn story_title(&self) -> String {
        format!("The Story of {}", self.payload.metadata.topic)
    }

    pub fn narration(&self) -> Option<&NarrationController> {
        self.narration.as_ref()
    }

    pub fn narration_mut(&mut self) -> Option<&mut NarrationController> {
        self.narration.as_mut()
    }

    /// Whether the "Ready for a Quiz?" action is still offered.
    pub fn offers_quiz(&self) -> bool {
        self.quiz.is_none()
    }

    pub fn reveal_quiz(&mut self) -> &mut QuizSession {
        let items = &self.payload.quiz_items;
        self.quiz.get_or_insert_with(|| QuizSession::new(items.clone()))
    }

    pub fn quiz(&self) -> Option<&QuizSession> {
        self.quiz.as_ref()
    }

    pub fn select_answer(&mut self, option_index: usize) -> Option<AnswerFeedback> {
        self.quiz.as_mut()?.select_answer(option_index)
    }

    pub fn advance(&mut self) -> bool {
        self.quiz.as_mut().is_some_and(QuizSession::advance)
    }

    /// Waits out the settle delay and reveals the takeaways, the first time
    /// it is called after the quiz finishes. Returns `None` otherwise.
    pub async fn settle_completion(&mut self) -> Option<QuizSummary> {
        let summary = self.quiz.as_mut()?.take_completion()?;
        tokio::time::sleep(self.settle_delay).await;
        self.takeaways_revealed = true;
        tracing::info!(score = summary.score, total = summary.total, "quiz complete");
        Some(summary)
    }

    pub fn takeaways(&self) -> Option<&[String]> {
        self.takeaways_revealed
            .then_some(self.payload.takeaways.as_slice())
    }
}
