use crate::voices::{GenderClass, VoiceProfile};
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// One system voice reported by the speech capability.
#[derive(Debug, Clone)]
pub struct EngineVoice {
    pub name: String,
    pub language: String,
}

/// A single synthesis request with already-clamped parameters. `voice` is
/// the resolved system voice name, or `None` to let the engine pick its
/// default.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<String>,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    Completed,
    Failed(String),
}

/// The external speech-synthesis capability, owned exclusively by the
/// playback sequencer for the duration of one story-reading session.
///
/// `speak` resolves when the engine reports end (`Completed`) or a runtime
/// error (`Failed`), returns `Err` when the engine refuses to start, and
/// may never resolve at all if the engine hangs silently; the sequencer's
/// watchdog bounds that case. `cancel` is best-effort and may race with a
/// pending completion.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Available system voices. May be empty right after startup while the
    /// platform populates its list; callers wait with a timeout fallback.
    async fn voices(&self) -> Result<Vec<EngineVoice>>;
    async fn speak(&self, utterance: Utterance) -> Result<SpeechOutcome>;
    fn cancel(&self);
    fn pause(&self);
    fn resume(&self);
    fn is_speaking(&self) -> bool;
    fn is_paused(&self) -> bool;
}

/// Best-effort match of a catalog profile against the system voice list:
/// prefer a language-matching voice whose name matches the profile hint or
/// a gender name cue, then any language-matching voice, then the first
/// voice. `None` means "no list yet, use the engine default".
pub fn find_best_voice(
    voices: &[EngineVoice],
    profile: &VoiceProfile,
    language: &str,
) -> Option<String> {
    if voices.is_empty() {
        return None;
    }

    let language = language.to_lowercase();
    let hint = profile.voice_hint.map(str::to_lowercase);
    let cues: &[&str] = match profile.gender {
        GenderClass::Male => &["male", "man", "david", "mark"],
        GenderClass::Female => &["female", "woman", "karen", "samantha"],
        GenderClass::Child | GenderClass::Elder => &[],
    };
    let lang_matches = |v: &EngineVoice| v.language.to_lowercase().contains(&language);

    let preferred = voices.iter().find(|v| {
        if !lang_matches(v) {
            return false;
        }
        let name = v.name.to_lowercase();
        hint.as_deref().map_or(false, |h| name.contains(h))
            || cues.iter().any(|c| name.contains(c))
    });
    if let Some(v) = preferred {
        return Some(v.name.clone());
    }

    if let Some(v) = voices.iter().find(|v| lang_matches(v)) {
        return Some(v.name.clone());
    }
    voices.first().map(|v| v.name.clone())
}

/// Stand-in synthesizer for the binary: "speaks" by sleeping in proportion
/// to the utterance length. Cancel interrupts the sleep; pause only flips
/// the reported flag, it does not stop the clock.
pub struct SimulatedEngine {
    chars_per_second: f32,
    cancelled: Notify,
    speaking: AtomicBool,
    paused: AtomicBool,
}

impl SimulatedEngine {
    pub fn new(chars_per_second: f32) -> Self {
        Self {
            chars_per_second: chars_per_second.max(1.0),
            cancelled: Notify::new(),
            speaking: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SpeechEngine for SimulatedEngine {
    async fn voices(&self) -> Result<Vec<EngineVoice>> {
        Ok(vec![
            EngineVoice {
                name: "Simulated Samantha".to_string(),
                language: "en-US".to_string(),
            },
            EngineVoice {
                name: "Simulated David".to_string(),
                language: "en-US".to_string(),
            },
        ])
    }

    async fn speak(&self, utterance: Utterance) -> Result<SpeechOutcome> {
        let secs = utterance.text.chars().count() as f32 / (self.chars_per_second * utterance.rate);
        debug!(
            "simulated speak ({} chars, voice {:?}, ~{:.1}s)",
            utterance.text.chars().count(),
            utterance.voice,
            secs
        );
        self.speaking.store(true, Ordering::SeqCst);
        let outcome = tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f32(secs.max(0.05))) => SpeechOutcome::Completed,
            _ = self.cancelled.notified() => SpeechOutcome::Failed("cancelled".to_string()),
        };
        self.speaking.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        Ok(outcome)
    }

    fn cancel(&self) {
        self.cancelled.notify_waiters();
        self.speaking.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
