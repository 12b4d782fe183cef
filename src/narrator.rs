use crate::detect::{CharacterDetector, GenderClassifier, LexicalGenderClassifier, RegexCharacterDetector};
use crate::engine::{find_best_voice, EngineVoice, SpeechEngine, SpeechOutcome, Utterance};
use crate::text;
use crate::voices::{assign_voice, CharacterVoice, VoiceMap, VoiceProfile};
use anyhow::Result;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_VOICE_LOAD_TIMEOUT: Duration = Duration::from_secs(2);

/// Narration surface over one speech engine: builds the character-to-voice
/// map for a story and renders single paragraphs with the right profile.
/// Owns the engine exclusively for one story-reading session.
pub struct Narrator {
    engine: Arc<dyn SpeechEngine>,
    detector: Box<dyn CharacterDetector>,
    classifier: Box<dyn GenderClassifier>,
    voices: VoiceMap,
    system_voices: Vec<EngineVoice>,
    language: String,
    voice_load_timeout: Duration,
    voices_loaded: bool,
}

impl Narrator {
    pub fn new(engine: Arc<dyn SpeechEngine>, language: &str) -> Self {
        Self::with_heuristics(
            engine,
            Box::new(RegexCharacterDetector::new()),
            Box::new(LexicalGenderClassifier::new()),
            language,
        )
    }

    pub fn with_heuristics(
        engine: Arc<dyn SpeechEngine>,
        detector: Box<dyn CharacterDetector>,
        classifier: Box<dyn GenderClassifier>,
        language: &str,
    ) -> Self {
        Self {
            engine,
            detector,
            classifier,
            voices: VoiceMap::new(),
            system_voices: Vec::new(),
            language: language.to_string(),
            voice_load_timeout: DEFAULT_VOICE_LOAD_TIMEOUT,
            voices_loaded: false,
        }
    }

    pub fn voice_load_timeout(mut self, timeout: Duration) -> Self {
        self.voice_load_timeout = timeout;
        self
    }

    pub fn engine_handle(&self) -> Arc<dyn SpeechEngine> {
        self.engine.clone()
    }

    /// System voices can populate asynchronously after startup; wait once,
    /// bounded, and degrade to the engine default selection on timeout.
    async fn ensure_system_voices(&mut self) {
        if self.voices_loaded {
            return;
        }
        match tokio::time::timeout(self.voice_load_timeout, self.engine.voices()).await {
            Ok(Ok(voices)) => {
                debug!("loaded {} system voice(s)", voices.len());
                self.system_voices = voices;
            }
            Ok(Err(err)) => warn!("voice list unavailable: {err:#}; using engine defaults"),
            Err(_) => warn!(
                "voice list did not load within {:?}; using engine defaults",
                self.voice_load_timeout
            ),
        }
        self.voices_loaded = true;
    }

    /// Scans the story once, assigns every detected character a voice and
    /// rebuilds the voice map. Never fails: heuristic misfires only shrink
    /// the cast, and the narrator entry is always installed first.
    pub async fn analyze_story_characters(&mut self, story_text: &str, genre: &str) {
        self.ensure_system_voices().await;
        self.voices.reset();

        for name in self.detector.detect(story_text) {
            if self.voices.contains(&name) {
                continue;
            }
            let gender = self.classifier.classify(&name, story_text);
            let profile = assign_voice(&name, gender, genre, &self.voices);
            debug!("character {name:?} -> {} ({gender:?})", profile.name);
            self.voices.insert(&name, profile);
        }

        info!(
            "character analysis done: {} speaker(s) including narrator",
            self.voices.len()
        );
    }

    pub fn character_voices(&self) -> Vec<CharacterVoice> {
        self.voices.all()
    }

    pub fn voice_map(&self) -> &VoiceMap {
        &self.voices
    }

    /// Manual override for one character's profile.
    pub fn set_character_voice(&mut self, name: &str, profile: VoiceProfile) {
        self.voices.insert(name, profile);
    }

    /// Speaks one cleaned paragraph as the given speaker. Empty cleaned
    /// text is reported as an immediate completion without touching the
    /// engine. Unknown speaker keys fall back to the narrator profile.
    pub async fn speak_paragraph(&self, raw_text: &str, speaker: &str) -> Result<SpeechOutcome> {
        let clean = text::clean(raw_text);
        if clean.is_empty() {
            debug!("nothing to speak after cleanup; completing immediately");
            return Ok(SpeechOutcome::Completed);
        }

        let profile = self.voices.voice_for(speaker);
        let utterance = Utterance {
            voice: find_best_voice(&self.system_voices, &profile, &self.language),
            pitch: profile.pitch.clamp(0.0, 2.0),
            rate: profile.rate.clamp(0.1, 10.0),
            volume: profile.volume.clamp(0.0, 1.0),
            text: clean,
        };
        self.engine.speak(utterance).await
    }

    pub fn stop_speaking(&self) {
        self.engine.cancel();
    }

    pub fn pause_speaking(&self) {
        if self.engine.is_speaking() && !self.engine.is_paused() {
            self.engine.pause();
        }
    }

    pub fn resume_speaking(&self) {
        if self.engine.is_paused() {
            self.engine.resume();
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.engine.is_speaking()
    }

    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }
}
