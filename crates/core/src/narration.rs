//! Read-aloud playback of a story.
//!
//! The story is split into sentence-sized chunks and spoken one utterance at
//! a time: a sequencer task waits for each utterance to end before queueing
//! the next. Long single utterances are unreliable on some speech engines,
//! and chunk boundaries give natural places to pause.

use crate::error::SpeechPlaybackError;
use crate::request::Language;
use crate::speech::{SpeechEngine, Utterance, UtteranceEvent, Voice, select_voice};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Wait between cancelling and starting again on restart, so the engine has
/// dropped the old utterance before the new one is queued.
pub const RESTART_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryControl {
    ReadAloud,
    Pause,
    Resume,
}

impl PrimaryControl {
    pub fn label(self) -> &'static str {
        match self {
            PrimaryControl::ReadAloud => "Read Aloud",
            PrimaryControl::Pause => "Pause",
            PrimaryControl::Resume => "Resume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrationControls {
    pub primary: PrimaryControl,
    pub show_restart: bool,
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Splits a story into speakable sentences.
///
/// Each chunk keeps its terminating punctuation (a run such as `?!` or `...`
/// stays together) and is trimmed. Fragments that are empty or punctuation
/// only are dropped. Text after the last terminator becomes a final chunk
/// rather than being lost, so `"A. B"` yields `["A.", "B"]`.
pub fn split_into_chunks(narrative: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars = narrative.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = index + c.len_utf8();
        while let Some(&(next_index, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            end = next_index + next.len_utf8();
            chars.next();
        }
        push_chunk(&mut chunks, &narrative[start..end]);
        start = end;
    }
    push_chunk(&mut chunks, &narrative[start..]);

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if fragment.chars().any(|c| !is_terminator(c)) {
        chunks.push(fragment.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Session {
    // Bumped on every start and cancel. A sequencer only acts while its
    // epoch is current, so callbacks from a cancelled run are ignored.
    epoch: u64,
    current_chunk: usize,
}

struct Shared {
    session: Mutex<Session>,
    state: watch::Sender<PlaybackState>,
}

impl Shared {
    fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }
}

/// Drives read-aloud playback for one story.
///
/// Only exists when the platform has a speech engine; without one there are
/// no controls and no session. Dropping the controller cancels any speech in
/// flight and ends its voice-list subscription.
pub struct NarrationController {
    engine: Arc<dyn SpeechEngine>,
    chunks: Arc<[String]>,
    language: Language,
    voices: Arc<Mutex<Vec<Voice>>>,
    shared: Arc<Shared>,
    sequencer: Option<JoinHandle<()>>,
    voice_refresh: JoinHandle<()>,
}

impl NarrationController {
    /// Creates a controller for `narrative`, or `None` when `engine` is
    /// `None`. Must be called inside a tokio runtime.
    pub fn attach(
        engine: Option<Arc<dyn SpeechEngine>>,
        narrative: &str,
        language: Language,
    ) -> Option<Self> {
        let Some(engine) = engine else {
            tracing::info!("no speech engine available, read-aloud disabled");
            return None;
        };
        let voices = Arc::new(Mutex::new(engine.voices()));
        let voice_refresh = spawn_voice_refresh(engine.clone(), voices.clone());
        let (state, _) = watch::channel(PlaybackState::Idle);
        let chunks: Arc<[String]> = split_into_chunks(narrative).into();
        tracing::debug!(chunks = chunks.len(), %language, "narration session created");

        Some(Self {
            engine,
            chunks,
            language,
            voices,
            shared: Arc::new(Shared {
                session: Mutex::new(Session {
                    epoch: 0,
                    current_chunk: 0,
                }),
                state,
            }),
            sequencer: None,
            voice_refresh,
        })
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn current_chunk(&self) -> usize {
        lock(&self.shared.session).current_chunk
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state.subscribe()
    }

    pub fn controls(&self) -> NarrationControls {
        let state = self.state();
        NarrationControls {
            primary: match state {
                PlaybackState::Idle => PrimaryControl::ReadAloud,
                PlaybackState::Playing => PrimaryControl::Pause,
                PlaybackState::Paused => PrimaryControl::Resume,
            },
            show_restart: state != PlaybackState::Idle,
        }
    }

    /// Starts reading from the first chunk when idle, otherwise toggles
    /// between playing and paused using the engine's own pause and resume.
    pub fn play_pause(&mut self) {
        {
            let _session = lock(&self.shared.session);
            match self.shared.state() {
                PlaybackState::Playing => {
                    self.engine.pause();
                    self.shared.state.send_replace(PlaybackState::Paused);
                    return;
                }
                PlaybackState::Paused => {
                    self.engine.resume();
                    self.shared.state.send_replace(PlaybackState::Playing);
                    return;
                }
                PlaybackState::Idle => {}
            }
        }
        self.start_from(0);
    }

    /// Stops everything and reads again from the first chunk.
    pub async fn restart(&mut self) {
        self.cancel();
        tokio::time::sleep(RESTART_SETTLE_DELAY).await;
        self.start_from(0);
    }

    /// Cancels speech in flight and resets to the first chunk. Does nothing
    /// when already idle.
    pub fn cancel(&mut self) {
        let mut session = lock(&self.shared.session);
        if self.shared.state() == PlaybackState::Idle {
            return;
        }
        session.epoch += 1;
        session.current_chunk = 0;
        if let Some(sequencer) = self.sequencer.take() {
            sequencer.abort();
        }
        self.engine.cancel();
        self.shared.state.send_replace(PlaybackState::Idle);
        tracing::debug!("narration cancelled");
    }

    /// Swaps in the story of a new payload. Any speech for the old story is
    /// cancelled and the voice list is reloaded.
    pub fn replace_narrative(&mut self, narrative: &str, language: Language) {
        self.cancel();
        self.chunks = split_into_chunks(narrative).into();
        self.language = language;
        *lock(&self.voices) = self.engine.voices();
        tracing::debug!(chunks = self.chunks.len(), %language, "narration session replaced");
    }

    fn start_from(&mut self, index: usize) {
        if index >= self.chunks.len() {
            return;
        }
        let epoch = {
            let mut session = lock(&self.shared.session);
            session.epoch += 1;
            session.current_chunk = index;
            self.shared.state.send_replace(PlaybackState::Playing);
            session.epoch
        };
        let sequence = Sequence {
            engine: self.engine.clone(),
            chunks: self.chunks.clone(),
            voice_tag: self.language.voice_tag(),
            voices: self.voices.clone(),
            shared: self.shared.clone(),
            epoch,
        };
        self.sequencer = Some(tokio::spawn(sequence.run(index)));
    }
}

impl Drop for NarrationController {
    fn drop(&mut self) {
        self.cancel();
        self.voice_refresh.abort();
    }
}

fn spawn_voice_refresh(
    engine: Arc<dyn SpeechEngine>,
    voices: Arc<Mutex<Vec<Voice>>>,
) -> JoinHandle<()> {
    let mut changes = engine.voices_changed();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    let available = engine.voices();
                    tracing::debug!(voices = available.len(), "speech voices changed");
                    *lock(&voices) = available;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// One run through the chunks, started by play or restart.
struct Sequence {
    engine: Arc<dyn SpeechEngine>,
    chunks: Arc<[String]>,
    voice_tag: &'static str,
    voices: Arc<Mutex<Vec<Voice>>>,
    shared: Arc<Shared>,
    epoch: u64,
}

impl Sequence {
    async fn run(self, start: usize) {
        for index in start..self.chunks.len() {
            let mut events = {
                let mut session = lock(&self.shared.session);
                if session.epoch != self.epoch {
                    return;
                }
                session.current_chunk = index;
                self.engine.speak(self.utterance(index))
            };

            loop {
                match events.recv().await {
                    Some(UtteranceEvent::Started) => {
                        tracing::trace!(chunk = index, "utterance started");
                    }
                    Some(UtteranceEvent::Ended) => break,
                    Some(UtteranceEvent::Error(reason)) => {
                        self.fail(SpeechPlaybackError {
                            chunk: index,
                            reason,
                        });
                        return;
                    }
                    None => {
                        self.fail(SpeechPlaybackError {
                            chunk: index,
                            reason: "utterance dropped by the speech engine".to_string(),
                        });
                        return;
                    }
                }
            }
        }

        if self.finish(false) {
            tracing::debug!("narration finished");
        }
    }

    fn utterance(&self, index: usize) -> Utterance {
        let voices = lock(&self.voices);
        Utterance {
            text: self.chunks[index].clone(),
            lang: Some(self.voice_tag.to_string()),
            voice: select_voice(&voices, self.voice_tag).cloned(),
        }
    }

    fn finish(&self, release_engine: bool) -> bool {
        let mut session = lock(&self.shared.session);
        if session.epoch != self.epoch {
            return false;
        }
        if release_engine {
            // Clears a pause the engine may still hold, so the next run can speak.
            self.engine.cancel();
        }
        session.current_chunk = 0;
        self.shared.state.send_replace(PlaybackState::Idle);
        true
    }

    fn fail(&self, error: SpeechPlaybackError) {
        // Errors from a cancelled run are the engine reporting the interruption.
        if self.finish(true) {
            tracing::error!("narration stopped: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct FakeEngine {
        voices: Mutex<Vec<Voice>>,
        spoken: Mutex<Vec<Utterance>>,
        active: Mutex<Vec<mpsc::UnboundedSender<UtteranceEvent>>>,
        pauses: Mutex<usize>,
        resumes: Mutex<usize>,
        cancels: Mutex<usize>,
        paused: Mutex<bool>,
        changes: Option<broadcast::Sender<()>>,
    }

    impl FakeEngine {
        fn new(voices: Vec<Voice>) -> Arc<Self> {
            let (changes, _) = broadcast::channel(4);
            Arc::new(Self {
                voices: Mutex::new(voices),
                changes: Some(changes),
                ..Default::default()
            })
        }

        fn spoken_texts(&self) -> Vec<String> {
            lock(&self.spoken).iter().map(|u| u.text.clone()).collect()
        }

        fn active_count(&self) -> usize {
            lock(&self.active).len()
        }

        fn end_current(&self) {
            let sender = lock(&self.active).remove(0);
            let _ = sender.send(UtteranceEvent::Started);
            let _ = sender.send(UtteranceEvent::Ended);
        }

        fn fail_current(&self, reason: &str) {
            let sender = lock(&self.active).remove(0);
            let _ = sender.send(UtteranceEvent::Error(reason.to_string()));
        }

        fn publish_voices(&self, voices: Vec<Voice>) {
            *lock(&self.voices) = voices;
            if let Some(changes) = &self.changes {
                let _ = changes.send(());
            }
        }
    }

    impl SpeechEngine for FakeEngine {
        fn voices(&self) -> Vec<Voice> {
            lock(&self.voices).clone()
        }

        fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<UtteranceEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            lock(&self.spoken).push(utterance);
            lock(&self.active).push(tx);
            rx
        }

        fn pause(&self) {
            *lock(&self.pauses) += 1;
            *lock(&self.paused) = true;
        }

        fn resume(&self) {
            *lock(&self.resumes) += 1;
            *lock(&self.paused) = false;
        }

        fn cancel(&self) {
            *lock(&self.cancels) += 1;
            *lock(&self.paused) = false;
            lock(&self.active).clear();
        }

        fn voices_changed(&self) -> broadcast::Receiver<()> {
            match &self.changes {
                Some(changes) => changes.subscribe(),
                None => broadcast::channel(1).1,
            }
        }
    }

    const STORY: &str = "Leafy woke up. The sun smiled! Did Leafy eat?";

    // Lets spawned tasks run until they block. Time is paused in these
    // tests, so the sleep only completes once every other task is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn controller(engine: &Arc<FakeEngine>, language: Language) -> NarrationController {
        let engine: Arc<dyn SpeechEngine> = engine.clone();
        NarrationController::attach(Some(engine), STORY, language).unwrap()
    }

    #[test]
    fn test_splits_on_sentence_terminators() {
        assert_eq!(
            split_into_chunks(STORY),
            vec!["Leafy woke up.", "The sun smiled!", "Did Leafy eat?"]
        );
    }

    #[test]
    fn test_keeps_terminator_runs_and_trailing_text() {
        assert_eq!(
            split_into_chunks("Wait... really?! Yes\n\nand then"),
            vec!["Wait...", "really?!", "Yes\n\nand then"]
        );
        assert_eq!(split_into_chunks("A. B"), vec!["A.", "B"]);
    }

    #[test]
    fn test_drops_empty_and_punctuation_only_fragments() {
        assert_eq!(split_into_chunks("  ... Hi.  !  "), vec!["Hi."]);
        assert!(split_into_chunks("   ").is_empty());
        assert!(split_into_chunks("").is_empty());
    }

    #[test]
    fn test_chunks_rejoin_to_original_sentences() {
        let narrative = "  One fish.   Two fish!\nRed fish?  Blue fish.";
        let chunks = split_into_chunks(narrative);
        assert!(chunks.iter().all(|chunk| !chunk.trim().is_empty()));
        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(squash(&chunks.join(" ")), squash(narrative));
    }

    #[test]
    fn test_handles_multibyte_text() {
        assert_eq!(
            split_into_chunks("सूरज चमका! पौधा खुश था."),
            vec!["सूरज चमका!", "पौधा खुश था."]
        );
    }

    #[test]
    fn test_no_engine_means_no_controller() {
        assert!(NarrationController::attach(None, STORY, Language::English).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_chunks_in_order_then_returns_to_idle() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);
        assert_eq!(narration.controls().primary, PrimaryControl::ReadAloud);
        assert!(!narration.controls().show_restart);

        narration.play_pause();
        settle().await;
        assert_eq!(narration.state(), PlaybackState::Playing);
        assert_eq!(engine.spoken_texts(), vec!["Leafy woke up."]);
        assert_eq!(narration.controls().primary, PrimaryControl::Pause);
        assert!(narration.controls().show_restart);

        engine.end_current();
        settle().await;
        assert_eq!(narration.current_chunk(), 1);
        assert_eq!(engine.active_count(), 1);

        engine.end_current();
        settle().await;
        engine.end_current();
        settle().await;

        assert_eq!(
            engine.spoken_texts(),
            vec!["Leafy woke up.", "The sun smiled!", "Did Leafy eat?"]
        );
        assert_eq!(narration.state(), PlaybackState::Idle);
        assert_eq!(engine.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_use_engine_without_cancelling() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);
        narration.play_pause();
        settle().await;

        narration.play_pause();
        assert_eq!(narration.state(), PlaybackState::Paused);
        assert_eq!(narration.controls().primary, PrimaryControl::Resume);
        narration.play_pause();
        assert_eq!(narration.state(), PlaybackState::Playing);

        assert_eq!(*lock(&engine.pauses), 1);
        assert_eq!(*lock(&engine.resumes), 1);
        assert_eq!(*lock(&engine.cancels), 0);
        assert_eq!(engine.spoken_texts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_begins_again_from_first_chunk() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);
        narration.play_pause();
        settle().await;
        engine.end_current();
        settle().await;
        assert_eq!(narration.current_chunk(), 1);

        narration.restart().await;
        settle().await;

        assert_eq!(narration.current_chunk(), 0);
        assert_eq!(narration.state(), PlaybackState::Playing);
        assert_eq!(engine.active_count(), 1);
        assert_eq!(engine.spoken_texts().last().unwrap(), "Leafy woke up.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_from_paused_and_idle_plays_once() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);

        narration.restart().await;
        settle().await;
        assert_eq!(engine.active_count(), 1);

        narration.play_pause();
        assert_eq!(narration.state(), PlaybackState::Paused);
        narration.restart().await;
        settle().await;
        assert_eq!(narration.state(), PlaybackState::Playing);
        assert_eq!(engine.active_count(), 1);
        assert_eq!(engine.spoken_texts(), vec!["Leafy woke up.", "Leafy woke up."]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_error_stops_without_retry() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);
        narration.play_pause();
        settle().await;
        engine.end_current();
        settle().await;

        engine.fail_current("synthesis-failed");
        settle().await;

        assert_eq!(narration.state(), PlaybackState::Idle);
        assert_eq!(narration.current_chunk(), 0);
        assert_eq!(engine.spoken_texts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_while_paused_releases_engine() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);
        narration.play_pause();
        settle().await;
        narration.play_pause();
        assert!(*lock(&engine.paused));

        engine.fail_current("interrupted");
        settle().await;
        assert_eq!(narration.state(), PlaybackState::Idle);
        assert!(!*lock(&engine.paused));
        assert_eq!(*lock(&engine.cancels), 1);

        narration.play_pause();
        settle().await;
        assert_eq!(narration.state(), PlaybackState::Playing);
        assert!(!*lock(&engine.paused));
        assert_eq!(engine.spoken_texts(), vec!["Leafy woke up.", "Leafy woke up."]);
        assert_eq!(engine.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);

        narration.cancel();
        assert_eq!(*lock(&engine.cancels), 0);

        narration.play_pause();
        settle().await;
        narration.cancel();
        narration.cancel();
        settle().await;
        assert_eq!(*lock(&engine.cancels), 1);
        assert_eq!(narration.state(), PlaybackState::Idle);
        assert_eq!(engine.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_story_cancels_and_resets() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);
        narration.play_pause();
        settle().await;
        engine.end_current();
        settle().await;

        narration.replace_narrative("A new tale. It ends.", Language::Hindi);
        settle().await;
        assert_eq!(narration.state(), PlaybackState::Idle);
        assert_eq!(narration.current_chunk(), 0);
        assert_eq!(narration.chunks(), ["A new tale.", "It ends."]);
        assert_eq!(engine.active_count(), 0);

        narration.play_pause();
        settle().await;
        assert_eq!(engine.spoken_texts().last().unwrap(), "A new tale.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_controller_cancels_speech() {
        let engine = FakeEngine::new(vec![]);
        let mut narration = controller(&engine, Language::English);
        narration.play_pause();
        settle().await;

        drop(narration);
        settle().await;
        assert_eq!(*lock(&engine.cancels), 1);
        assert_eq!(engine.active_count(), 0);
        assert_eq!(engine.spoken_texts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_utterances_carry_language_tag_and_refreshed_voice() {
        let engine = FakeEngine::new(vec![Voice::new("Generic", "en-GB", true)]);
        let mut narration = controller(&engine, Language::Hindi);
        settle().await;

        engine.publish_voices(vec![
            Voice::new("Remote Hindi", "hi-IN", false),
            Voice::new("Local Hindi", "hi-IN", true),
        ]);
        settle().await;

        narration.play_pause();
        settle().await;
        let spoken = lock(&engine.spoken).clone();
        assert_eq!(spoken[0].lang.as_deref(), Some("hi-IN"));
        assert_eq!(spoken[0].voice.as_ref().unwrap().name, "Local Hindi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_language_leaves_voice_to_engine() {
        let engine = FakeEngine::new(vec![Voice::new("Generic", "en-US", true)]);
        let mut narration = controller(&engine, Language::Urdu);
        narration.play_pause();
        settle().await;
        let spoken = lock(&engine.spoken).clone();
        assert_eq!(spoken[0].lang.as_deref(), Some("ur-IN"));
        assert!(spoken[0].voice.is_none());
    }
}
