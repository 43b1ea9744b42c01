use tokio::sync::{broadcast, mpsc};

/// A voice offered by the speech engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 style locale tag such as `en-US`.
    pub lang: String,
    /// Synthesised on this machine rather than by a remote service.
    pub local_service: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>, local_service: bool) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            local_service,
        }
    }
}

/// One request to speak a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub lang: Option<String>,
    /// `None` lets the engine use its default voice.
    pub voice: Option<Voice>,
}

/// Progress of a single utterance, reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    Started,
    Ended,
    Error(String),
}

/// Platform text-to-speech capability.
///
/// Modelled on browser speech synthesis: `speak` queues an utterance and its
/// lifecycle arrives on the returned channel, `pause`/`resume` keep the
/// position inside the current utterance, and `cancel` drops everything
/// queued or speaking and clears a pending pause. A cancelled utterance may
/// either close its channel or report an error.
pub trait SpeechEngine: Send + Sync {
    fn voices(&self) -> Vec<Voice>;

    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<UtteranceEvent>;

    fn pause(&self);

    fn resume(&self);

    fn cancel(&self);

    /// Fires whenever the set of available voices changes.
    fn voices_changed(&self) -> broadcast::Receiver<()>;
}

/// Picks the voice for a locale tag.
///
/// Preference order: a local voice with exactly that tag, any voice with that
/// tag, any voice sharing the primary language subtag. `None` means the
/// engine default should be used.
pub fn select_voice<'a>(voices: &'a [Voice], tag: &str) -> Option<&'a Voice> {
    let primary = primary_subtag(tag);
    voices
        .iter()
        .find(|voice| voice.lang == tag && voice.local_service)
        .or_else(|| voices.iter().find(|voice| voice.lang == tag))
        .or_else(|| {
            voices
                .iter()
                .find(|voice| primary_subtag(&voice.lang).eq_ignore_ascii_case(primary))
        })
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}
