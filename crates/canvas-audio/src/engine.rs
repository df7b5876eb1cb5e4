//! The audio engine: spoken-line queue and mood music bed.
//!
//! Two independently-lifecycled subsystems share one ducking relationship:
//! starting an utterance ducks the music gain, the queue draining to empty
//! restores it. The mood bed keeps exactly one looping source alive; mood
//! switches are strictly sequential (stop the previous source, then start
//! the next). Every failure degrades silently - playback problems must
//! never stall the conversation pipeline.

use rand::seq::IteratorRandom;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;

use canvas_core::mood::Mood;

use crate::backend::AudioBackend;

/// Music gain while nothing is being spoken.
pub const MUSIC_VOL_NORMAL: f32 = 0.25;
/// Music gain while an utterance plays.
pub const MUSIC_VOL_DUCKED: f32 = 0.05;

const DUCK_RAMP: Duration = Duration::from_millis(500);
const UNDUCK_RAMP: Duration = Duration::from_secs(2);
const FADE_IN: Duration = Duration::from_secs(2);
const FADE_OUT: Duration = Duration::from_secs(2);
/// Grace period after the fade-out before the source is released.
const FADE_OUT_RELEASE: Duration = Duration::from_millis(2100);

struct EngineState {
    /// Pending spoken lines, drained one at a time (single flight).
    queue: VecDeque<String>,
    /// True while the drain worker owns the queue.
    worker_active: bool,
    music_enabled: bool,
    /// Set once a mood has been established (randomly on first enable, or
    /// by the pipeline); later enables reuse it instead of re-rolling.
    mood_established: bool,
    mood: Mood,
    /// Bumped on every source start/stop decision so delayed releases
    /// cannot kill a newer source.
    play_generation: u64,
    /// Bumped on every flush; a line popped before the bump belongs to
    /// the flushed batch and must not start.
    speech_generation: u64,
}

struct EngineInner {
    backend: Arc<dyn AudioBackend>,
    state: Mutex<EngineState>,
}

/// Queued text-to-speech over a looping mood-music bed.
///
/// Cheap to clone; clones share the same queue and music source.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

impl AudioEngine {
    /// Creates an engine over the given backend. Music starts disabled; a
    /// mood is established on first enable or first [`Self::set_mood`].
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                backend,
                state: Mutex::new(EngineState {
                    queue: VecDeque::new(),
                    worker_active: false,
                    music_enabled: false,
                    mood_established: false,
                    mood: Mood::default(),
                    play_generation: 0,
                    speech_generation: 0,
                }),
            }),
        }
    }

    /// Appends an utterance to the spoken-line queue. The worker drains one
    /// entry at a time, starting the next only after the previous finished
    /// or was flushed.
    pub async fn enqueue_speech(&self, text: impl Into<String>) {
        let mut state = self.inner.state.lock().await;
        state.queue.push_back(text.into());
        if !state.worker_active {
            state.worker_active = true;
            tokio::spawn(Self::drain_queue(self.inner.clone()));
        }
    }

    /// Clears the pending queue and forcibly halts the current utterance,
    /// resetting to idle immediately. Exists to stop overlapping playback
    /// when a new interaction starts while a prior reply is still spoken.
    pub async fn stop_all_speech(&self) {
        let mut state = self.inner.state.lock().await;
        state.queue.clear();
        state.speech_generation += 1;
        self.inner.backend.cancel_speech();
        if state.music_enabled {
            self.inner
                .backend
                .ramp_music_gain(MUSIC_VOL_NORMAL, UNDUCK_RAMP);
        }
    }

    /// Records the mood chosen by the reasoning collaborator. When music is
    /// enabled and the mood actually changed, the current source is stopped
    /// before the new one starts - never two sources at once.
    pub async fn set_mood(&self, mood: Mood) {
        let mut state = self.inner.state.lock().await;
        let previous = state.mood;
        state.mood = mood;
        state.mood_established = true;

        if state.music_enabled && previous != mood {
            state.play_generation += 1;
            self.replace_music_source(mood);
        }
    }

    /// Enables or disables the music bed. First-ever enable picks a random
    /// mood; disabling fades the gain out and then releases the source.
    pub async fn set_music_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock().await;
        if enabled {
            state.music_enabled = true;
            if !state.mood_established {
                state.mood = Mood::iter()
                    .choose(&mut rand::thread_rng())
                    .unwrap_or_default();
                state.mood_established = true;
                tracing::debug!(mood = %state.mood, "randomly selected initial mood");
            }
            state.play_generation += 1;
            self.replace_music_source(state.mood);
        } else {
            state.music_enabled = false;
            let generation = state.play_generation;
            self.inner.backend.ramp_music_gain(0.0, FADE_OUT);

            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(FADE_OUT_RELEASE).await;
                let state = inner.state.lock().await;
                // A newer enable supersedes the pending release.
                if !state.music_enabled && state.play_generation == generation {
                    inner.backend.stop_music();
                }
            });
        }
    }

    /// Returns the established mood.
    pub async fn current_mood(&self) -> Mood {
        self.inner.state.lock().await.mood
    }

    /// Number of utterances still waiting in the queue.
    pub async fn pending_speech(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    /// Stop-then-start replace of the looping source. Caller holds the
    /// state lock, which serializes back-to-back switches.
    fn replace_music_source(&self, mood: Mood) {
        self.inner.backend.stop_music();
        match self.inner.backend.start_music(mood) {
            Ok(()) => {
                self.inner
                    .backend
                    .ramp_music_gain(MUSIC_VOL_NORMAL, FADE_IN);
            }
            Err(err) => {
                tracing::warn!(mood = %mood, error = %err, "music unavailable for mood");
            }
        }
    }

    async fn drain_queue(inner: Arc<EngineInner>) {
        loop {
            let (text, generation) = {
                let mut state = inner.state.lock().await;
                match state.queue.pop_front() {
                    Some(text) => (text, state.speech_generation),
                    None => {
                        state.worker_active = false;
                        if state.music_enabled {
                            inner.backend.ramp_music_gain(MUSIC_VOL_NORMAL, UNDUCK_RAMP);
                        }
                        return;
                    }
                }
            };

            inner.backend.ramp_music_gain(MUSIC_VOL_DUCKED, DUCK_RAMP);

            // A flush may have landed between the pop and here; the popped
            // line is part of the flushed batch and must not start.
            if inner.state.lock().await.speech_generation != generation {
                continue;
            }

            if let Err(err) = inner.backend.speak(&text).await {
                tracing::warn!(error = %err, "speech synthesis failed, skipping line");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use canvas_core::Result;
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Start(Mood),
        Stop,
        Ramp(f32),
        Speak(String),
        Cancel,
    }

    /// Backend that records the exact call order. In manual mode an
    /// utterance plays until the test finishes or cancels it. A ramp gate
    /// makes the first gain ramp block until the test releases it.
    struct RecordingBackend {
        events: std::sync::Mutex<Vec<Event>>,
        auto_complete: bool,
        current: std::sync::Mutex<Option<oneshot::Sender<()>>>,
        ramp_gate: std::sync::Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl RecordingBackend {
        fn auto() -> Arc<Self> {
            Arc::new(Self {
                events: std::sync::Mutex::new(Vec::new()),
                auto_complete: true,
                current: std::sync::Mutex::new(None),
                ramp_gate: std::sync::Mutex::new(None),
            })
        }

        fn manual() -> Arc<Self> {
            Arc::new(Self {
                events: std::sync::Mutex::new(Vec::new()),
                auto_complete: false,
                current: std::sync::Mutex::new(None),
                ramp_gate: std::sync::Mutex::new(None),
            })
        }

        fn with_gated_ramp() -> (Arc<Self>, std::sync::mpsc::Sender<()>) {
            let (tx, rx) = std::sync::mpsc::channel();
            let backend = Arc::new(Self {
                events: std::sync::Mutex::new(Vec::new()),
                auto_complete: true,
                current: std::sync::Mutex::new(None),
                ramp_gate: std::sync::Mutex::new(Some(rx)),
            });
            (backend, tx)
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.events.lock().unwrap().clear();
        }

        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn finish_current(&self) {
            if let Some(tx) = self.current.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    }

    #[async_trait]
    impl AudioBackend for RecordingBackend {
        fn start_music(&self, mood: Mood) -> Result<()> {
            self.record(Event::Start(mood));
            Ok(())
        }

        fn stop_music(&self) {
            self.record(Event::Stop);
        }

        fn ramp_music_gain(&self, target: f32, _duration: Duration) {
            self.record(Event::Ramp(target));
            let gate = self.ramp_gate.lock().unwrap().take();
            if let Some(rx) = gate {
                let _ = rx.recv();
            }
        }

        async fn speak(&self, text: &str) -> Result<()> {
            self.record(Event::Speak(text.to_string()));
            if self.auto_complete {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            *self.current.lock().unwrap() = Some(tx);
            // A dropped sender (cancel) resolves the playback too.
            let _ = rx.await;
            Ok(())
        }

        fn cancel_speech(&self) {
            self.record(Event::Cancel);
            self.current.lock().unwrap().take();
        }
    }

    async fn wait_until(backend: &RecordingBackend, check: impl Fn(&[Event]) -> bool) {
        for _ in 0..400 {
            if check(&backend.events()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached, events: {:?}", backend.events());
    }

    fn speak_count(events: &[Event]) -> usize {
        events.iter().filter(|e| matches!(e, Event::Speak(_))).count()
    }

    #[tokio::test]
    async fn stop_all_flushes_queue_and_unducks() {
        let backend = RecordingBackend::manual();
        let engine = AudioEngine::new(backend.clone());
        engine.set_music_enabled(true).await;

        engine.enqueue_speech("line one").await;
        engine.enqueue_speech("line two").await;
        engine.enqueue_speech("line three").await;
        engine.enqueue_speech("line four").await;

        // First line is mid-playback, three more queued.
        wait_until(&backend, |e| speak_count(e) == 1).await;
        assert_eq!(engine.pending_speech().await, 3);

        engine.stop_all_speech().await;
        assert_eq!(engine.pending_speech().await, 0);

        wait_until(&backend, |e| e.contains(&Event::Cancel)).await;
        // Give the worker time to observe the empty queue.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = backend.events();
        assert_eq!(speak_count(&events), 1, "no further lines may start");
        assert_eq!(
            events.last(),
            Some(&Event::Ramp(MUSIC_VOL_NORMAL)),
            "music gain returns toward normal"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn flush_between_pop_and_speak_drops_the_line() {
        let (backend, release) = RecordingBackend::with_gated_ramp();
        let engine = AudioEngine::new(backend.clone());

        // The worker pops the line, then parks inside the duck ramp.
        engine.enqueue_speech("doomed line").await;
        wait_until(&backend, |e| e.contains(&Event::Ramp(MUSIC_VOL_DUCKED))).await;

        // The flush lands while the line is popped but not yet speaking.
        engine.stop_all_speech().await;
        assert_eq!(engine.pending_speech().await, 0);

        release.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            speak_count(&backend.events()),
            0,
            "a line popped before the flush must not start afterwards"
        );
    }

    #[tokio::test]
    async fn utterance_ducks_and_drain_unducks() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());
        engine.set_music_enabled(true).await;
        backend.clear();

        engine.enqueue_speech("a single line").await;
        wait_until(&backend, |e| e.last() == Some(&Event::Ramp(MUSIC_VOL_NORMAL))).await;

        let events = backend.events();
        let duck = events
            .iter()
            .position(|e| *e == Event::Ramp(MUSIC_VOL_DUCKED))
            .expect("duck ramp");
        let speak = events
            .iter()
            .position(|e| matches!(e, Event::Speak(_)))
            .expect("utterance");
        assert!(duck < speak, "duck happens before the line starts: {events:?}");
    }

    #[tokio::test]
    async fn queue_is_single_flight_fifo() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());

        engine.enqueue_speech("first").await;
        engine.enqueue_speech("second").await;
        wait_until(&backend, |e| speak_count(e) == 2).await;

        let spoken: Vec<String> = backend
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Speak(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(spoken, vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn drain_does_not_wake_disabled_music() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());

        engine.enqueue_speech("quiet line").await;
        wait_until(&backend, |e| speak_count(e) == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(
            !backend.events().contains(&Event::Ramp(MUSIC_VOL_NORMAL)),
            "no unduck while music is disabled"
        );
    }

    #[tokio::test]
    async fn mood_switch_stops_previous_source_first() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());
        engine.set_music_enabled(true).await;
        let initial = engine.current_mood().await;
        backend.clear();

        let next = Mood::iter().find(|m| *m != initial).unwrap();
        engine.set_mood(next).await;

        let events = backend.events();
        assert_eq!(
            events,
            vec![
                Event::Stop,
                Event::Start(next),
                Event::Ramp(MUSIC_VOL_NORMAL)
            ],
            "exactly one stop before the new source starts"
        );
    }

    #[tokio::test]
    async fn unchanged_mood_does_not_restart_music() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());
        engine.set_music_enabled(true).await;
        let mood = engine.current_mood().await;
        backend.clear();

        engine.set_mood(mood).await;
        assert!(backend.events().is_empty());
    }

    #[tokio::test]
    async fn mood_set_while_disabled_is_remembered_not_played() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());

        engine.set_mood(Mood::Melancholy).await;
        assert!(backend.events().is_empty(), "disabled music stays silent");

        // Enabling later starts the established mood, no random re-roll.
        engine.set_music_enabled(true).await;
        assert!(backend.events().contains(&Event::Start(Mood::Melancholy)));
    }

    #[tokio::test(start_paused = true)]
    async fn disable_fades_out_then_releases_source() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());
        engine.set_music_enabled(true).await;
        backend.clear();

        engine.set_music_enabled(false).await;
        assert_eq!(backend.events(), vec![Event::Ramp(0.0)]);

        tokio::time::sleep(Duration::from_millis(2200)).await;
        wait_until(&backend, |e| e.contains(&Event::Stop)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn quick_reenable_survives_pending_release() {
        let backend = RecordingBackend::auto();
        let engine = AudioEngine::new(backend.clone());
        engine.set_music_enabled(true).await;
        let mood = engine.current_mood().await;

        engine.set_music_enabled(false).await;
        engine.set_music_enabled(true).await;
        backend.clear();

        // Let the delayed release task fire; it must not kill the new source.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(
            !backend.events().contains(&Event::Stop),
            "superseded release must not stop the re-enabled source"
        );
        assert_eq!(engine.current_mood().await, mood);
    }
}
