use crate::commands::{Command, HELP};
use crate::render;
use learn_tales_core::content::{ContentPayload, ImageAsset};
use learn_tales_core::coordinator::{AppState, Coordinator, Illustration, Phase};
use learn_tales_core::narration::{NarrationController, PlaybackState};
use learn_tales_core::quiz::QuizView;
use learn_tales_core::request::LearningForm;
use learn_tales_core::speech::SpeechEngine;
use learn_tales_core::view::ResultView;
use std::mem::discriminant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// The interactive session: the form, the coordinator and whatever result
/// page is on screen. Every method returns the text to show, if any.
pub struct App {
    form: LearningForm,
    coordinator: Coordinator,
    engine: Option<Arc<dyn SpeechEngine>>,
    image_out: Option<PathBuf>,
    result: Option<ResultView>,
    shown_payload: Option<Arc<ContentPayload>>,
    last_phase: Phase,
    last_illustration: Illustration,
}

impl App {
    pub fn new(
        form: LearningForm,
        coordinator: Coordinator,
        engine: Option<Arc<dyn SpeechEngine>>,
        image_out: Option<PathBuf>,
    ) -> Self {
        Self {
            form,
            coordinator,
            engine,
            image_out,
            result: None,
            shown_payload: None,
            last_phase: Phase::Idle,
            last_illustration: Illustration::Absent,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn form(&self) -> &LearningForm {
        &self.form
    }

    pub fn result(&self) -> Option<&ResultView> {
        self.result.as_ref()
    }

    /// Playback changes of the story on screen, when it can be read aloud.
    pub fn narration_updates(&self) -> Option<watch::Receiver<PlaybackState>> {
        self.result.as_ref()?.narration().map(NarrationController::subscribe)
    }

    /// The read-aloud controls line, when the story can be read aloud.
    pub fn narration_controls(&self) -> Option<String> {
        let narration = self.result.as_ref()?.narration()?;
        Some(render::controls(narration.controls()))
    }

    pub fn render_form(&self) -> String {
        render::form(&self.form, self.form.can_submit(self.coordinator.is_loading()))
    }

    /// Sends the form to the coordinator. Progress arrives through `on_state`.
    pub fn submit(&mut self) -> Option<String> {
        if self.coordinator.is_loading() {
            return Some("A story is already being created.".to_string());
        }
        let request = match self.form.to_request() {
            Ok(request) => request,
            Err(e) => return Some(format!("Cannot create a story: {e}.")),
        };
        match self.coordinator.submit(request) {
            Ok(_generation) => None,
            Err(e) => Some(format!("Cannot create a story: {e}.")),
        }
    }

    /// Brings the page in line with a new coordinator state.
    pub async fn on_state(&mut self, state: &AppState) -> Vec<String> {
        let mut out = Vec::new();

        if state.phase() != self.last_phase {
            self.last_phase = state.phase();
            out.extend(render::phase(state));
        }

        match state.payload() {
            Some(payload) => {
                let already_shown = self
                    .shown_payload
                    .as_ref()
                    .is_some_and(|shown| Arc::ptr_eq(shown, payload));
                if !already_shown {
                    self.show_payload(payload.clone(), state);
                    if let Some(view) = &self.result {
                        out.push(render::story(view));
                    }
                }
            }
            None => {
                // Dropping the view cancels any narration in flight.
                self.result = None;
                self.shown_payload = None;
            }
        }

        let illustration = state.illustration();
        if discriminant(illustration) != discriminant(&self.last_illustration) {
            self.last_illustration = illustration.clone();
            out.extend(render::illustration(illustration));
            if let (Illustration::Ready(image), Some(path)) = (illustration, &self.image_out) {
                out.push(save_illustration(image, path).await);
            }
        }

        out
    }

    fn show_payload(&mut self, payload: Arc<ContentPayload>, state: &AppState) {
        self.shown_payload = Some(payload.clone());
        match self.result.as_mut() {
            Some(view) => view.load(payload, state.language()),
            None => {
                self.result = Some(ResultView::new(
                    payload,
                    self.engine.clone(),
                    state.language(),
                ));
            }
        }
    }

    pub async fn handle(&mut self, command: Command) -> Option<String> {
        match command {
            Command::Read => self.read_aloud(),
            Command::Restart => self.restart().await,
            Command::Quiz => self.start_quiz(),
            Command::Answer(letter) => self.answer(letter.index()).await,
            Command::Next => self.next_question(),
            Command::Topic(topic) => {
                self.form.topic = topic;
                Some(self.render_form())
            }
            Command::Language(language) => {
                self.form.language = language;
                Some(self.render_form())
            }
            Command::Class(class_grade) => {
                self.form.class_grade = class_grade;
                Some(self.render_form())
            }
            Command::Subject(subject) => {
                self.form.subject = subject;
                Some(self.render_form())
            }
            Command::Generate => self.submit(),
            Command::Status => Some(self.status()),
            Command::Help => Some(HELP.to_string()),
            Command::Quit => None,
        }
    }

    fn read_aloud(&mut self) -> Option<String> {
        let Some(view) = self.result.as_mut() else {
            return Some("Create a story first.".to_string());
        };
        let Some(narration) = view.narration_mut() else {
            return Some("Read aloud is not available.".to_string());
        };
        narration.play_pause();
        Some(render::controls(narration.controls()))
    }

    async fn restart(&mut self) -> Option<String> {
        let narration = self.result.as_mut()?.narration_mut()?;
        narration.restart().await;
        Some(render::controls(narration.controls()))
    }

    fn start_quiz(&mut self) -> Option<String> {
        let Some(view) = self.result.as_mut() else {
            return Some("Create a story first.".to_string());
        };
        Some(render::quiz(view.reveal_quiz().view()))
    }

    async fn answer(&mut self, option_index: usize) -> Option<String> {
        let Some(view) = self.result.as_mut() else {
            return Some("Create a story first.".to_string());
        };
        let Some(quiz) = view.quiz() else {
            return Some("Start the quiz first with 'quiz'.".to_string());
        };
        let explanation = quiz
            .current_item()
            .map(|item| item.explanation.clone())
            .unwrap_or_default();

        let Some(feedback) = view.select_answer(option_index) else {
            return Some("This question is already answered. Type 'next' to continue.".to_string());
        };
        let verdict = render::feedback(&feedback);
        if !feedback.finishes_quiz {
            let quiz = view.quiz().map(|quiz| render::quiz(quiz.view()));
            return Some(format!("{verdict}\n{}", quiz.unwrap_or_default()));
        }

        let mut out = vec![verdict, explanation];
        if let Some(summary) = view.settle_completion().await {
            out.push(render::quiz_summary(summary));
        }
        if let Some(takeaways) = view.takeaways() {
            out.push(render::takeaways(takeaways));
        }
        Some(out.join("\n"))
    }

    fn next_question(&mut self) -> Option<String> {
        let view = self.result.as_mut()?;
        if view.advance() {
            return view.quiz().map(|quiz| render::quiz(quiz.view()));
        }
        match view.quiz().map(|quiz| quiz.view()) {
            None => Some("Start the quiz first with 'quiz'.".to_string()),
            Some(QuizView::Complete(summary)) => Some(render::quiz_summary(summary)),
            Some(_) => Some("Answer this question first.".to_string()),
        }
    }

    fn status(&self) -> String {
        let state = self.coordinator.snapshot();
        let mut out = vec![self.render_form()];
        out.extend(render::phase(&state));
        if let Some(view) = &self.result {
            out.push(render::headline(view.payload()));
            if let Some(narration) = view.narration() {
                out.push(render::controls(narration.controls()));
            }
            if let Some(quiz) = view.quiz() {
                out.push(render::quiz(quiz.view()));
            }
        }
        out.extend(render::illustration(state.illustration()));
        out.join("\n")
    }
}

async fn save_illustration(image: &ImageAsset, path: &Path) -> String {
    let path = if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(image.extension())
    };
    match tokio::fs::write(&path, &image.bytes).await {
        Ok(()) => {
            tracing::info!("Saved illustration to {}", path.display());
            format!("Illustration saved to {}", path.display())
        }
        Err(e) => {
            tracing::warn!("failed to save illustration to {}: {}", path.display(), e);
            format!("Could not save the illustration: {e}")
        }
    }
}
