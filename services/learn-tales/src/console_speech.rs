//! A speech engine for terminals without a synthesiser: the text of each
//! utterance is written out word by word at speaking pace.

use learn_tales_core::request::Language;
use learn_tales_core::speech::{SpeechEngine, Utterance, UtteranceEvent, Voice};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

/// Receives each spoken word, and a newline when an utterance ends.
pub type Sink = Arc<dyn Fn(&str) + Send + Sync>;

pub struct ConsoleSpeechEngine {
    inner: Arc<Inner>,
}

struct Inner {
    word_duration: Duration,
    sink: Sink,
    paused: watch::Sender<bool>,
    // Bumped by `cancel`; utterances from an older epoch stop.
    epoch: watch::Sender<u64>,
    // Utterances are spoken one at a time, in the order they were queued.
    turn: tokio::sync::Mutex<()>,
    voices: Mutex<Vec<Voice>>,
    voices_changed: broadcast::Sender<()>,
}

impl ConsoleSpeechEngine {
    pub fn new(words_per_minute: u32) -> Self {
        Self::with_sink(words_per_minute, Arc::new(print_to_stdout))
    }

    pub fn with_sink(words_per_minute: u32, sink: Sink) -> Self {
        let words_per_minute = u64::from(words_per_minute.max(1));
        let (voices_changed, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(Inner {
                word_duration: Duration::from_millis(60_000 / words_per_minute),
                sink,
                paused: watch::Sender::new(false),
                epoch: watch::Sender::new(0),
                turn: tokio::sync::Mutex::new(()),
                voices: Mutex::new(default_voices()),
                voices_changed,
            }),
        }
    }

    /// Replaces the advertised voices and notifies listeners.
    pub fn set_voices(&self, voices: Vec<Voice>) {
        *self
            .inner
            .voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = voices;
        // No receivers is fine.
        let _ = self.inner.voices_changed.send(());
    }
}

/// One local voice per supported language.
fn default_voices() -> Vec<Voice> {
    Language::ALL
        .iter()
        .map(|language| {
            Voice::new(
                format!("Console {}", language.name()),
                language.voice_tag(),
                true,
            )
        })
        .collect()
}

fn print_to_stdout(text: &str) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = write!(stdout, "{text}").and_then(|_| stdout.flush()) {
        tracing::warn!("failed to write narration: {}", e);
    }
}

impl SpeechEngine for ConsoleSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        self.inner
            .voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<UtteranceEvent> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let epoch = *self.inner.epoch.borrow();
        tracing::trace!(
            voice = utterance.voice.as_ref().map(|v| v.name.as_str()),
            "utterance queued"
        );
        tokio::spawn(speak_utterance(
            self.inner.clone(),
            utterance.text,
            epoch,
            events_tx,
        ));
        events_rx
    }

    fn pause(&self) {
        self.inner.paused.send_replace(true);
    }

    fn resume(&self) {
        self.inner.paused.send_replace(false);
    }

    fn cancel(&self) {
        self.inner.epoch.send_modify(|epoch| *epoch += 1);
        self.inner.paused.send_replace(false);
    }

    fn voices_changed(&self) -> broadcast::Receiver<()> {
        self.inner.voices_changed.subscribe()
    }
}

// Dropping `events` without sending `Ended` is how a cancelled utterance ends.
async fn speak_utterance(
    inner: Arc<Inner>,
    text: String,
    epoch: u64,
    events: mpsc::UnboundedSender<UtteranceEvent>,
) {
    let _turn = inner.turn.lock().await;
    let mut cancelled = inner.epoch.subscribe();
    let mut paused = inner.paused.subscribe();
    let current = *cancelled.borrow();
    if current != epoch {
        return;
    }

    let _ = events.send(UtteranceEvent::Started);
    for (index, word) in text.split_whitespace().enumerate() {
        tokio::select! {
            _ = async {
                let _ = cancelled.wait_for(|current| *current != epoch).await;
            } => return,
            _ = async {
                let _ = paused.wait_for(|is_paused| !*is_paused).await;
                tokio::time::sleep(inner.word_duration).await;
            } => {}
        }
        if index > 0 {
            (inner.sink)(" ");
        }
        (inner.sink)(word);
    }
    (inner.sink)("\n");
    let _ = events.send(UtteranceEvent::Ended);
}
