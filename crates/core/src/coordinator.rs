use crate::content::{ContentPayload, ImageAsset};
use crate::error::{GenerationError, ImageGenerationError, SubmitError};
use crate::generator::ContentGenerator;
use crate::request::{Language, LearningRequest};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    ContentReady,
    Error,
}

/// The illustration runs alongside the content and never affects `Phase`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Illustration {
    Absent,
    Loading,
    Ready(Arc<ImageAsset>),
    /// Nothing is drawn, the same as `Absent`.
    Failed,
}

/// Identifies one submission. Responses for anything but the latest one are
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    Stale,
    Failed,
    Ready { illustration_prompt: Option<String> },
}

/// Learner-facing text for a failed request.
pub fn banner_message(error: &GenerationError) -> String {
    format!("Oh no! Something went wrong. {error}. Please try again.")
}

/// Everything the presentation needs to draw the page.
#[derive(Debug, Clone)]
pub struct AppState {
    phase: Phase,
    payload: Option<Arc<ContentPayload>>,
    illustration: Illustration,
    error: Option<String>,
    language: Language,
    generation: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            payload: None,
            illustration: Illustration::Absent,
            error: None,
            language: Language::default(),
            generation: 0,
        }
    }
}

impl AppState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// The payload, only once content is ready.
    pub fn payload(&self) -> Option<&Arc<ContentPayload>> {
        match self.phase {
            Phase::ContentReady => self.payload.as_ref(),
            _ => None,
        }
    }

    pub fn illustration(&self) -> &Illustration {
        &self.illustration
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Language captured when the current content was requested.
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn begin_submission(
        &mut self,
        request: &LearningRequest,
    ) -> Result<GenerationToken, SubmitError> {
        if self.is_loading() {
            return Err(SubmitError::Busy);
        }
        self.generation += 1;
        self.phase = Phase::Loading;
        self.payload = None;
        self.illustration = Illustration::Absent;
        self.error = None;
        self.language = request.language;
        Ok(GenerationToken(self.generation))
    }

    pub fn content_resolved(
        &mut self,
        token: GenerationToken,
        result: Result<ContentPayload, GenerationError>,
    ) -> ContentOutcome {
        if token.0 != self.generation || !self.is_loading() {
            return ContentOutcome::Stale;
        }
        match result {
            Ok(payload) => {
                let prompt = payload.image_prompt.trim();
                let illustration_prompt = (!prompt.is_empty()).then(|| prompt.to_string());
                self.illustration = if illustration_prompt.is_some() {
                    Illustration::Loading
                } else {
                    Illustration::Absent
                };
                self.payload = Some(Arc::new(payload));
                self.phase = Phase::ContentReady;
                ContentOutcome::Ready {
                    illustration_prompt,
                }
            }
            Err(error) => {
                self.error = Some(banner_message(&error));
                self.phase = Phase::Error;
                ContentOutcome::Failed
            }
        }
    }

    /// Returns whether anything changed.
    pub fn illustration_resolved(
        &mut self,
        token: GenerationToken,
        result: Result<ImageAsset, ImageGenerationError>,
    ) -> bool {
        if token.0 != self.generation || self.illustration != Illustration::Loading {
            return false;
        }
        self.illustration = match result {
            Ok(asset) => Illustration::Ready(Arc::new(asset)),
            Err(_) => Illustration::Failed,
        };
        true
    }
}

/// Runs submissions against the content generator and publishes every state
/// change on a watch channel.
pub struct Coordinator {
    generator: Arc<dyn ContentGenerator>,
    state: Arc<watch::Sender<AppState>>,
}

impl Coordinator {
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        let (state, _) = watch::channel(AppState::default());
        Self {
            generator,
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Starts a generation cycle. Rejected while a previous request is still
    /// loading. The returned task finishes once the illustration has settled.
    pub fn submit(&self, request: LearningRequest) -> Result<JoinHandle<()>, SubmitError> {
        let mut started = Err(SubmitError::Busy);
        self.state.send_if_modified(|state| {
            started = state.begin_submission(&request);
            started.is_ok()
        });
        let token = started?;

        tracing::info!(
            class = %request.class_grade,
            subject = %request.subject,
            topic = %request.topic,
            language = %request.language,
            "generating story"
        );
        let generator = self.generator.clone();
        let state = self.state.clone();
        Ok(tokio::spawn(run_generation(generator, state, token, request)))
    }
}

async fn run_generation(
    generator: Arc<dyn ContentGenerator>,
    state: Arc<watch::Sender<AppState>>,
    token: GenerationToken,
    request: LearningRequest,
) {
    let result = generator.request_content(&request).await;
    if let Err(e) = &result {
        tracing::error!("content generation failed: {}", e);
    }

    let mut outcome = ContentOutcome::Stale;
    state.send_if_modified(|state| {
        outcome = state.content_resolved(token, result);
        outcome != ContentOutcome::Stale
    });

    let prompt = match outcome {
        ContentOutcome::Ready {
            illustration_prompt: Some(prompt),
        } => prompt,
        ContentOutcome::Stale => {
            tracing::debug!("discarding content for a superseded request");
            return;
        }
        _ => return,
    };

    let image = generator.request_illustration(&prompt).await;
    match &image {
        Ok(asset) => tracing::info!(bytes = asset.bytes.len(), "illustration ready"),
        Err(e) => tracing::warn!("illustration generation failed, continuing without it: {}", e),
    }
    state.send_if_modified(|state| state.illustration_resolved(token, image));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::fixtures::photosynthesis;
    use crate::generator::MockContentGenerator;
    use crate::request::{ClassGrade, Subject};
    use crate::view::ResultView;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn request(language: Language) -> LearningRequest {
        LearningRequest::new(
            ClassGrade::new(4).unwrap(),
            Subject::Science,
            "Photosynthesis",
            language,
        )
        .unwrap()
    }

    fn coordinator(generator: MockContentGenerator) -> Coordinator {
        Coordinator::new(Arc::new(generator))
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_then_illustration() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_request_content()
            .times(1)
            .returning(|_| Ok(photosynthesis()));
        generator
            .expect_request_illustration()
            .withf(|prompt| prompt.starts_with("A smiling green plant"))
            .times(1)
            .returning(|_| Ok(ImageAsset::new("image/jpeg", vec![0xff, 0xd8])));
        let coordinator = coordinator(generator);
        let mut updates = coordinator.subscribe();

        let task = coordinator.submit(request(Language::English)).unwrap();
        assert_eq!(coordinator.snapshot().phase(), Phase::Loading);
        assert!(coordinator.is_loading());

        updates.changed().await.unwrap();
        task.await.unwrap();

        let state = coordinator.snapshot();
        assert_eq!(state.phase(), Phase::ContentReady);
        assert_eq!(state.payload().unwrap().metadata.topic, "Photosynthesis");
        assert!(matches!(state.illustration(), Illustration::Ready(asset) if asset.bytes.len() == 2));
        assert!(state.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_while_loading_fires_no_second_request() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_request_content()
            .times(1)
            .returning(|_| Ok(photosynthesis()));
        generator
            .expect_request_illustration()
            .returning(|_| Err(ImageGenerationError::NoImage));
        let coordinator = coordinator(generator);

        let task = coordinator.submit(request(Language::English)).unwrap();
        assert_eq!(
            coordinator.submit(request(Language::Hindi)).unwrap_err(),
            SubmitError::Busy
        );
        task.await.unwrap();

        assert_eq!(coordinator.snapshot().language(), Language::English);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_shows_banner_and_allows_resubmit() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_request_content()
            .times(1)
            .returning(|_| Err(GenerationError::Transport("connection refused".to_string())));
        generator.expect_request_illustration().never();
        let coordinator = coordinator(generator);

        coordinator
            .submit(request(Language::English))
            .unwrap()
            .await
            .unwrap();

        let state = coordinator.snapshot();
        assert_eq!(state.phase(), Phase::Error);
        let banner = state.error().unwrap();
        assert!(banner.starts_with("Oh no! Something went wrong."));
        assert!(banner.contains("connection refused"));
        assert!(state.payload().is_none());
        assert_eq!(state.illustration(), &Illustration::Absent);
        assert!(!coordinator.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmission_after_error_clears_banner() {
        let mut generator = MockContentGenerator::new();
        let mut calls = 0;
        generator.expect_request_content().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(GenerationError::Timeout(Duration::from_secs(30)))
            } else {
                Ok(photosynthesis())
            }
        });
        generator
            .expect_request_illustration()
            .returning(|_| Err(ImageGenerationError::NoImage));
        let coordinator = coordinator(generator);

        coordinator
            .submit(request(Language::English))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(coordinator.snapshot().phase(), Phase::Error);

        let task = coordinator.submit(request(Language::Tamil)).unwrap();
        assert!(coordinator.snapshot().error().is_none());
        task.await.unwrap();

        let state = coordinator.snapshot();
        assert_eq!(state.phase(), Phase::ContentReady);
        assert_eq!(state.language(), Language::Tamil);
    }

    #[tokio::test(start_paused = true)]
    async fn test_illustration_failure_is_silent() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_request_content()
            .returning(|_| Ok(photosynthesis()));
        generator
            .expect_request_illustration()
            .times(1)
            .returning(|_| Err(ImageGenerationError::Request("quota exceeded".to_string())));
        let coordinator = coordinator(generator);

        coordinator
            .submit(request(Language::English))
            .unwrap()
            .await
            .unwrap();

        let state = coordinator.snapshot();
        assert_eq!(state.phase(), Phase::ContentReady);
        assert!(state.error().is_none());
        assert_eq!(state.illustration(), &Illustration::Failed);

        let mut view = ResultView::new(state.payload().unwrap().clone(), None, state.language());
        view.reveal_quiz();
        assert!(view.select_answer(0).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_image_prompt_skips_illustration() {
        let mut generator = MockContentGenerator::new();
        generator.expect_request_content().returning(|_| {
            let mut payload = photosynthesis();
            payload.image_prompt = "  ".to_string();
            Ok(payload)
        });
        generator.expect_request_illustration().never();
        let coordinator = coordinator(generator);

        coordinator
            .submit(request(Language::English))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(coordinator.snapshot().illustration(), &Illustration::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_photosynthesis_walkthrough() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_request_content()
            .withf(|request| {
                request.class_grade.to_string() == "Class 4"
                    && request.subject == Subject::Science
                    && request.topic == "Photosynthesis"
                    && request.language == Language::English
            })
            .returning(|_| Ok(photosynthesis()));
        generator
            .expect_request_illustration()
            .returning(|_| Err(ImageGenerationError::NoImage));
        let coordinator = coordinator(generator);
        coordinator
            .submit(request(Language::English))
            .unwrap()
            .await
            .unwrap();

        let state = coordinator.snapshot();
        let payload = state.payload().unwrap().clone();
        assert_eq!(crate::narration::split_into_chunks(&payload.narrative).len(), 3);

        let mut view = ResultView::new(payload, None, state.language());
        assert!(view.narration().is_none());
        view.reveal_quiz();
        for pick in [0, 1, 2, 0, 0] {
            view.select_answer(pick).unwrap();
            view.advance();
        }
        assert!(view.takeaways().is_none());

        let summary = view.settle_completion().await.unwrap();
        assert_eq!(summary.score, 4);
        assert_eq!(summary.total, 5);
        assert_eq!(view.takeaways().unwrap().len(), 3);
        assert!(view.settle_completion().await.is_none());
    }

    /// Holds each content request until the test releases it.
    struct GatedGenerator {
        gates: Mutex<Vec<oneshot::Receiver<ContentPayload>>>,
    }

    #[async_trait]
    impl ContentGenerator for GatedGenerator {
        async fn request_content(
            &self,
            _request: &LearningRequest,
        ) -> Result<ContentPayload, GenerationError> {
            let gate = self.gates.lock().unwrap().remove(0);
            gate.await.map_err(|_| GenerationError::Empty)
        }

        async fn request_illustration(
            &self,
            _image_prompt: &str,
        ) -> Result<ImageAsset, ImageGenerationError> {
            Err(ImageGenerationError::NoImage)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_for_superseded_request_is_discarded() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let generator = GatedGenerator {
            gates: Mutex::new(vec![first_rx, second_rx]),
        };
        let coordinator = Coordinator::new(Arc::new(generator));

        let first = coordinator.submit(request(Language::English)).unwrap();
        tokio::task::yield_now().await;

        // Force the first request out of Loading, as if the user navigated away
        // and the state was rebuilt, then start a second one.
        coordinator.state.send_modify(|state| state.phase = Phase::Idle);
        let second = coordinator.submit(request(Language::Hindi)).unwrap();
        tokio::task::yield_now().await;

        let mut newer = photosynthesis();
        newer.metadata.topic = "Newer".to_string();
        second_tx.send(newer).unwrap();
        second.await.unwrap();

        let mut older = photosynthesis();
        older.metadata.topic = "Older".to_string();
        first_tx.send(older).unwrap();
        first.await.unwrap();

        let state = coordinator.snapshot();
        assert_eq!(state.payload().unwrap().metadata.topic, "Newer");
        assert_eq!(state.language(), Language::Hindi);
    }

    #[test]
    fn test_banner_template_wraps_reason() {
        let error = GenerationError::Api {
            status: 503,
            message: "model overloaded".to_string(),
        };
        assert_eq!(
            banner_message(&error),
            "Oh no! Something went wrong. the content service returned an error (503): model overloaded. Please try again."
        );
    }
}
