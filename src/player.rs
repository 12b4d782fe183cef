use crate::engine::{SpeechEngine, SpeechOutcome};
use crate::narrator::Narrator;
use crate::speaker;
use crate::story;
use crate::text;
use crate::voices::{CharacterVoice, NARRATOR_KEY};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Explicit playback states; the tagged enum makes combinations like
/// "playing while still initializing" unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Initializing,
    Ready,
    Speaking,
    Paused,
    Complete,
}

/// Observable playback position, published on every transition.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub paragraph: usize,
    pub speaker: String,
    pub voices: Arc<Vec<CharacterVoice>>,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Assumed speaking rate used to estimate utterance duration.
    pub chars_per_second: f32,
    /// Lower bound on the estimated duration, so short paragraphs still get
    /// a sane watchdog window.
    pub watchdog_floor: Duration,
    /// Added on top of the estimate before the watchdog fires.
    pub watchdog_buffer: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chars_per_second: 15.0,
            watchdog_floor: Duration::from_secs(1),
            watchdog_buffer: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
enum Command {
    Play,
    Pause,
    Resume,
    SkipForward,
    SkipBackward,
    Seek(usize),
    Stop,
}

/// Sequential "speak paragraph, attribute speaker, advance" playback over
/// one story. State lives in a spawned control task; the handle sends
/// commands over a channel and observes snapshots over a watch channel.
/// Dropping the handle tears the session down and cancels the engine.
pub struct Player {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    engine: Arc<dyn SpeechEngine>,
    task: JoinHandle<()>,
}

impl Player {
    pub fn spawn(narrator: Narrator, content: &str, genre: &str, config: PlaybackConfig) -> Self {
        let engine = narrator.engine_handle();
        let paragraphs: Vec<String> = story::split_paragraphs(content)
            .into_iter()
            .map(str::to_string)
            .collect();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(PlaybackSnapshot {
            state: PlaybackState::Idle,
            paragraph: 0,
            speaker: NARRATOR_KEY.to_string(),
            voices: Arc::new(Vec::new()),
        });
        let task = tokio::spawn(run_loop(
            narrator,
            content.to_string(),
            genre.to_string(),
            paragraphs,
            config,
            command_rx,
            snapshot_tx,
        ));
        Self {
            commands,
            snapshots,
            engine,
            task,
        }
    }

    pub fn play(&self) {
        self.send(Command::Play);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    pub fn skip_forward(&self) {
        self.send(Command::SkipForward);
    }

    pub fn skip_backward(&self) {
        self.send(Command::SkipBackward);
    }

    pub fn seek(&self, paragraph: usize) {
        self.send(Command::Seek(paragraph));
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("playback task already gone; command dropped");
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits until the published snapshot satisfies the predicate.
    pub async fn wait_until(&mut self, predicate: impl Fn(&PlaybackSnapshot) -> bool) {
        loop {
            if predicate(&self.snapshots.borrow()) {
                return;
            }
            if self.snapshots.changed().await.is_err() {
                return;
            }
        }
    }

    pub async fn wait_for(&mut self, state: PlaybackState) {
        self.wait_until(|snapshot| snapshot.state == state).await;
    }

    /// Orderly teardown: stops the control task and cancels any in-flight
    /// synthesis.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Stop);
        let _ = (&mut self.task).await;
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.task.abort();
        self.engine.cancel();
    }
}

fn watchdog_duration(paragraph: &str, config: &PlaybackConfig) -> Duration {
    let cleaned = text::clean(paragraph);
    let estimated = Duration::from_secs_f32(cleaned.chars().count() as f32 / config.chars_per_second);
    estimated.max(config.watchdog_floor) + config.watchdog_buffer
}

async fn run_loop(
    mut narrator: Narrator,
    content: String,
    genre: String,
    paragraphs: Vec<String>,
    config: PlaybackConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<PlaybackSnapshot>,
) {
    let publish = |state: PlaybackState, paragraph: usize, speaker: &str, voices: &Arc<Vec<CharacterVoice>>| {
        let _ = snapshots.send(PlaybackSnapshot {
            state,
            paragraph,
            speaker: speaker.to_string(),
            voices: voices.clone(),
        });
    };

    let mut voices = Arc::new(Vec::new());
    publish(PlaybackState::Initializing, 0, NARRATOR_KEY, &voices);
    narrator.analyze_story_characters(&content, &genre).await;
    voices = Arc::new(narrator.character_voices());
    // Playback controls are disabled while initializing; discard anything
    // queued. A stop queued during the voice-load wait must still win,
    // otherwise `shutdown` would await this task forever.
    loop {
        match commands.try_recv() {
            Ok(Command::Stop) => return,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    let mut index = 0usize;
    let mut playing = false;
    let mut complete = paragraphs.is_empty();
    let mut speaker = String::from(NARRATOR_KEY);

    if complete {
        info!("story has no paragraphs; nothing to narrate");
        publish(PlaybackState::Complete, 0, &speaker, &voices);
    } else {
        publish(PlaybackState::Ready, index, &speaker, &voices);
    }

    loop {
        if playing && !complete {
            speaker = speaker::attribute(&paragraphs[index], narrator.voice_map());
            publish(PlaybackState::Speaking, index, &speaker, &voices);
            debug!(
                "speaking paragraph {}/{} as {}",
                index + 1,
                paragraphs.len(),
                speaker
            );

            let watchdog = watchdog_duration(&paragraphs[index], &config);
            let utterance = narrator.speak_paragraph(&paragraphs[index], &speaker);
            tokio::pin!(utterance);
            let timer = tokio::time::sleep(watchdog);
            tokio::pin!(timer);

            // `advance` stays true for end, error and watchdog alike: a bad
            // paragraph must never stall the rest of the story.
            let mut advance = true;
            loop {
                tokio::select! {
                    outcome = &mut utterance => {
                        match outcome {
                            Ok(SpeechOutcome::Completed) => {
                                debug!("finished paragraph {}", index + 1);
                            }
                            Ok(SpeechOutcome::Failed(reason)) => {
                                warn!("synthesis error on paragraph {}: {reason}; continuing", index + 1);
                            }
                            Err(err) => {
                                warn!("synthesis failed to start on paragraph {}: {err:#}; continuing", index + 1);
                            }
                        }
                        break;
                    }
                    _ = &mut timer => {
                        warn!(
                            "watchdog fired after {watchdog:?} on paragraph {}; forcing end",
                            index + 1
                        );
                        narrator.stop_speaking();
                        break;
                    }
                    command = commands.recv() => { match command {
                        Some(Command::Pause) => {
                            narrator.pause_speaking();
                            publish(PlaybackState::Paused, index, &speaker, &voices);
                        }
                        Some(Command::Resume) => {
                            narrator.resume_speaking();
                            publish(PlaybackState::Speaking, index, &speaker, &voices);
                        }
                        Some(Command::Play) => {}
                        Some(Command::SkipForward) => {
                            narrator.stop_speaking();
                            if index + 1 < paragraphs.len() {
                                index += 1;
                            }
                            advance = false;
                            break;
                        }
                        Some(Command::SkipBackward) => {
                            narrator.stop_speaking();
                            index = index.saturating_sub(1);
                            advance = false;
                            break;
                        }
                        Some(Command::Seek(target)) => {
                            narrator.stop_speaking();
                            index = target.min(paragraphs.len() - 1);
                            playing = false;
                            advance = false;
                            break;
                        }
                        Some(Command::Stop) | None => {
                            narrator.stop_speaking();
                            return;
                        }
                    } }
                }
            }
            // The in-flight utterance future is dropped right here, before
            // the index is touched again, so a straggling completion from a
            // cancelled utterance can never advance the new position.

            if advance {
                if index + 1 >= paragraphs.len() {
                    playing = false;
                    complete = true;
                    info!("story complete ({} paragraphs)", paragraphs.len());
                    publish(PlaybackState::Complete, index, &speaker, &voices);
                } else {
                    index += 1;
                }
            } else if !playing {
                publish(PlaybackState::Ready, index, &speaker, &voices);
            }
        } else {
            match commands.recv().await {
                Some(Command::Play) => {
                    if complete {
                        debug!("play ignored; story already complete");
                    } else {
                        playing = true;
                    }
                }
                Some(Command::Pause) | Some(Command::Resume) => {}
                Some(Command::SkipForward) => {
                    if index + 1 < paragraphs.len() {
                        index += 1;
                        complete = false;
                        publish(PlaybackState::Ready, index, &speaker, &voices);
                    }
                }
                Some(Command::SkipBackward) => {
                    if index > 0 {
                        index -= 1;
                        complete = false;
                        publish(PlaybackState::Ready, index, &speaker, &voices);
                    }
                }
                Some(Command::Seek(target)) => {
                    if !paragraphs.is_empty() {
                        index = target.min(paragraphs.len() - 1);
                        complete = false;
                        publish(PlaybackState::Ready, index, &speaker, &voices);
                    }
                }
                Some(Command::Stop) | None => {
                    narrator.stop_speaking();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineVoice, Utterance};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Completes every utterance immediately and records what was spoken.
    #[derive(Default)]
    struct InstantEngine {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechEngine for InstantEngine {
        async fn voices(&self) -> Result<Vec<EngineVoice>> {
            Ok(Vec::new())
        }
        async fn speak(&self, utterance: Utterance) -> Result<SpeechOutcome> {
            self.spoken.lock().unwrap().push(utterance.text);
            Ok(SpeechOutcome::Completed)
        }
        fn cancel(&self) {}
        fn pause(&self) {}
        fn resume(&self) {}
        fn is_speaking(&self) -> bool {
            false
        }
        fn is_paused(&self) -> bool {
            false
        }
    }

    /// Refuses the second utterance with a synchronous error.
    #[derive(Default)]
    struct FailsSecondEngine {
        calls: AtomicUsize,
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechEngine for FailsSecondEngine {
        async fn voices(&self) -> Result<Vec<EngineVoice>> {
            Ok(Vec::new())
        }
        async fn speak(&self, utterance: Utterance) -> Result<SpeechOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 1 {
                anyhow::bail!("engine refused utterance");
            }
            self.spoken.lock().unwrap().push(utterance.text);
            Ok(SpeechOutcome::Completed)
        }
        fn cancel(&self) {}
        fn pause(&self) {}
        fn resume(&self) {}
        fn is_speaking(&self) -> bool {
            false
        }
        fn is_paused(&self) -> bool {
            false
        }
    }

    /// Never reports end or error, like a hung platform synthesizer.
    #[derive(Default)]
    struct HangingEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechEngine for HangingEngine {
        async fn voices(&self) -> Result<Vec<EngineVoice>> {
            Ok(Vec::new())
        }
        async fn speak(&self, _utterance: Utterance) -> Result<SpeechOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
        fn cancel(&self) {}
        fn pause(&self) {}
        fn resume(&self) {}
        fn is_speaking(&self) -> bool {
            true
        }
        fn is_paused(&self) -> bool {
            false
        }
    }

    /// Records each utterance, then blocks until the test releases a permit.
    struct GatedEngine {
        spoken: Mutex<Vec<String>>,
        gate: Semaphore,
        speaking: AtomicBool,
        paused: AtomicBool,
    }

    impl GatedEngine {
        fn new() -> Self {
            Self {
                spoken: Mutex::new(Vec::new()),
                gate: Semaphore::new(0),
                speaking: AtomicBool::new(false),
                paused: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl SpeechEngine for GatedEngine {
        async fn voices(&self) -> Result<Vec<EngineVoice>> {
            Ok(Vec::new())
        }
        async fn speak(&self, utterance: Utterance) -> Result<SpeechOutcome> {
            self.spoken.lock().unwrap().push(utterance.text);
            self.speaking.store(true, Ordering::SeqCst);
            let permit = self.gate.acquire().await?;
            permit.forget();
            self.speaking.store(false, Ordering::SeqCst);
            Ok(SpeechOutcome::Completed)
        }
        fn cancel(&self) {
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

    /// Takes a while to enumerate voices, like a platform still populating
    /// its list at startup.
    struct SlowVoicesEngine;

    #[async_trait]
    impl SpeechEngine for SlowVoicesEngine {
        async fn voices(&self) -> Result<Vec<EngineVoice>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Vec::new())
        }
        async fn speak(&self, _utterance: Utterance) -> Result<SpeechOutcome> {
            Ok(SpeechOutcome::Completed)
        }
        fn cancel(&self) {}
        fn pause(&self) {}
        fn resume(&self) {}
        fn is_speaking(&self) -> bool {
            false
        }
        fn is_paused(&self) -> bool {
            false
        }
    }

    const THREE_PARAS: &str = "Para one.\n\nPara two.\n\nPara three.";

    fn player_with<E: SpeechEngine + 'static>(engine: Arc<E>, content: &str) -> Player {
        let narrator = Narrator::new(engine, "en");
        Player::spawn(narrator, content, "Fantasy", PlaybackConfig::default())
    }

    #[tokio::test]
    async fn auto_advance_speaks_every_paragraph_in_order() {
        let engine = Arc::new(InstantEngine::default());
        let mut player = player_with(engine.clone(), THREE_PARAS);
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player.wait_for(PlaybackState::Complete).await;

        let spoken = engine.spoken.lock().unwrap().clone();
        assert_eq!(spoken, vec!["Para one.", "Para two.", "Para three."]);
        // Index parks on the last paragraph instead of running past the end.
        assert_eq!(player.snapshot().paragraph, 2);
    }

    #[tokio::test]
    async fn empty_story_completes_without_an_utterance() {
        let engine = Arc::new(InstantEngine::default());
        let mut player = player_with(engine.clone(), "\n\n   \n");
        player.wait_for(PlaybackState::Complete).await;
        player.play();
        // Play after completion stays a no-op.
        tokio::task::yield_now().await;
        assert!(engine.spoken.lock().unwrap().is_empty());
        assert_eq!(player.snapshot().state, PlaybackState::Complete);
    }

    #[tokio::test]
    async fn start_failure_does_not_stall_the_story() {
        let engine = Arc::new(FailsSecondEngine::default());
        let mut player = player_with(engine.clone(), THREE_PARAS);
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player.wait_for(PlaybackState::Complete).await;

        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
        let spoken = engine.spoken.lock().unwrap().clone();
        assert_eq!(spoken, vec!["Para one.", "Para three."]);
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_forces_progress_through_a_hung_engine() {
        let engine = Arc::new(HangingEngine::default());
        let mut player = player_with(engine.clone(), THREE_PARAS);
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player.wait_for(PlaybackState::Complete).await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn skip_during_speech_never_double_advances() {
        let engine = Arc::new(GatedEngine::new());
        let mut player = player_with(engine.clone(), THREE_PARAS);
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player
            .wait_until(|s| s.state == PlaybackState::Speaking && s.paragraph == 0)
            .await;

        // Skip while paragraph 0 is in flight; its completion must not move
        // the new index a second time.
        player.skip_forward();
        player
            .wait_until(|s| s.state == PlaybackState::Speaking && s.paragraph == 1)
            .await;

        engine.gate.add_permits(2);
        player.wait_for(PlaybackState::Complete).await;

        let spoken = engine.spoken.lock().unwrap().clone();
        assert_eq!(spoken, vec!["Para one.", "Para two.", "Para three."]);
        assert_eq!(player.snapshot().paragraph, 2);
    }

    #[tokio::test]
    async fn pause_and_resume_keep_position() {
        let engine = Arc::new(GatedEngine::new());
        let mut player = player_with(engine.clone(), THREE_PARAS);
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player.wait_for(PlaybackState::Speaking).await;

        player.pause();
        player.wait_for(PlaybackState::Paused).await;
        assert!(engine.is_paused());
        assert_eq!(player.snapshot().paragraph, 0);

        player.resume();
        player.wait_for(PlaybackState::Speaking).await;
        assert!(!engine.is_paused());

        engine.gate.add_permits(3);
        player.wait_for(PlaybackState::Complete).await;
    }

    #[tokio::test]
    async fn seek_clamps_and_requires_explicit_play() {
        let engine = Arc::new(InstantEngine::default());
        let mut player = player_with(engine.clone(), THREE_PARAS);
        player.wait_for(PlaybackState::Ready).await;

        player.seek(99);
        player.wait_until(|s| s.paragraph == 2).await;
        assert_eq!(player.snapshot().state, PlaybackState::Ready);
        assert!(engine.spoken.lock().unwrap().is_empty());

        player.play();
        player.wait_for(PlaybackState::Complete).await;
        let spoken = engine.spoken.lock().unwrap().clone();
        assert_eq!(spoken, vec!["Para three."]);
    }

    #[tokio::test]
    async fn seek_rearms_playback_after_completion() {
        let engine = Arc::new(InstantEngine::default());
        let mut player = player_with(engine.clone(), THREE_PARAS);
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player.wait_for(PlaybackState::Complete).await;

        player.seek(0);
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player.wait_for(PlaybackState::Complete).await;
        assert_eq!(engine.spoken.lock().unwrap().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_initialization_does_not_hang() {
        let player = player_with(Arc::new(SlowVoicesEngine), THREE_PARAS);
        // Stop lands while the control task is still waiting on the voice
        // list; it must still terminate the task.
        let done = tokio::time::timeout(Duration::from_secs(3), player.shutdown()).await;
        assert!(done.is_ok());
    }

    #[tokio::test]
    async fn markup_only_paragraph_is_skipped_silently() {
        let engine = Arc::new(InstantEngine::default());
        let mut player = player_with(engine.clone(), "Chapter 1:\nHello world.");
        player.wait_for(PlaybackState::Ready).await;
        player.play();
        player.wait_for(PlaybackState::Complete).await;
        let spoken = engine.spoken.lock().unwrap().clone();
        assert_eq!(spoken, vec!["Hello world."]);
    }
}
