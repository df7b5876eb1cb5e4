//! Rodio-backed [`AudioBackend`] implementation.
//!
//! Music playback runs on a dedicated output thread that owns the rodio
//! `OutputStream` (which cannot leave the thread it was created on); the
//! backend talks to it over a command channel. Speech is synthesized by an
//! optional external TTS command. A missing output device, a missing mood
//! asset, or a missing synthesizer all degrade silently.

use async_trait::async_trait;
use rodio::source::Source;
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use canvas_core::mood::Mood;
use canvas_core::{CanvasError, Result};

use crate::backend::AudioBackend;

/// Container formats tried for each mood, in preference order.
const ASSET_EXTENSIONS: [&str; 3] = ["mp3", "ogg", "wav"];

const RAMP_STEP: Duration = Duration::from_millis(50);
const CHILD_POLL: Duration = Duration::from_millis(50);

enum MusicCommand {
    /// Stop the current source (if any) and start looping the file, silent.
    Start(PathBuf),
    Stop,
    SetVolume(f32),
}

/// [`AudioBackend`] over a local sound device and an external synthesizer.
pub struct RodioBackend {
    tx: Mutex<std::sync::mpsc::Sender<MusicCommand>>,
    assets_dir: PathBuf,
    /// External TTS program invoked with the utterance as its argument.
    /// `None` means voice output silently does nothing.
    tts_program: Option<String>,
    /// Last gain actually sent to the sink; the start point for the next
    /// ramp even when it supersedes one mid-flight.
    current_volume: Arc<Mutex<f32>>,
    ramp_generation: Arc<AtomicU64>,
    speaking_child: Arc<Mutex<Option<tokio::process::Child>>>,
}

impl RodioBackend {
    /// Creates the backend and spawns the output thread.
    ///
    /// `assets_dir` holds one loopable track per mood, named
    /// `<mood>.{mp3,ogg,wav}`.
    pub fn new(assets_dir: impl Into<PathBuf>, tts_program: Option<String>) -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::Builder::new()
            .name("canvas-audio-output".to_string())
            .spawn(move || output_thread(rx))
            .ok();

        Self {
            tx: Mutex::new(tx),
            assets_dir: assets_dir.into(),
            tts_program,
            current_volume: Arc::new(Mutex::new(0.0)),
            ramp_generation: Arc::new(AtomicU64::new(0)),
            speaking_child: Arc::new(Mutex::new(None)),
        }
    }

    fn send(&self, command: MusicCommand) {
        if let Ok(tx) = self.tx.lock() {
            // A dead output thread just means silence.
            let _ = tx.send(command);
        }
    }

    fn resolve_asset(&self, mood: Mood) -> Option<PathBuf> {
        ASSET_EXTENSIONS
            .iter()
            .map(|ext| self.assets_dir.join(format!("{mood}.{ext}")))
            .find(|path| path.exists())
    }
}

#[async_trait]
impl AudioBackend for RodioBackend {
    fn start_music(&self, mood: Mood) -> Result<()> {
        let path = self.resolve_asset(mood).ok_or_else(|| {
            CanvasError::audio(format!(
                "no audio asset for mood '{mood}' in {}",
                self.assets_dir.display()
            ))
        })?;

        if let Ok(mut volume) = self.current_volume.lock() {
            *volume = 0.0;
        }
        self.send(MusicCommand::Start(path));
        Ok(())
    }

    fn stop_music(&self) {
        self.send(MusicCommand::Stop);
    }

    fn ramp_music_gain(&self, target: f32, duration: Duration) {
        let generation = self.ramp_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let start = self.current_volume.lock().map(|v| *v).unwrap_or(0.0);
        let steps = (duration.as_millis() / RAMP_STEP.as_millis()).max(1) as u32;

        let tx = match self.tx.lock() {
            Ok(tx) => tx.clone(),
            Err(_) => return,
        };
        let ramp_generation = self.ramp_generation.clone();
        let current_volume = self.current_volume.clone();
        tokio::spawn(async move {
            for step in 1..=steps {
                tokio::time::sleep(RAMP_STEP).await;
                // A newer ramp supersedes this one.
                if ramp_generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                let volume = start + (target - start) * (step as f32 / steps as f32);
                let _ = tx.send(MusicCommand::SetVolume(volume));
                if let Ok(mut current) = current_volume.lock() {
                    *current = volume;
                }
            }
        });
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let Some(program) = self.tts_program.as_deref() else {
            return Ok(());
        };

        let child = tokio::process::Command::new(program)
            .arg(text)
            .spawn()
            .map_err(|err| CanvasError::audio(format!("failed to spawn '{program}': {err}")))?;

        if let Ok(mut slot) = self.speaking_child.lock() {
            *slot = Some(child);
        }

        // Poll rather than hold the lock across an await; cancel_speech
        // empties the slot, which ends the utterance for us.
        loop {
            tokio::time::sleep(CHILD_POLL).await;
            let Ok(mut slot) = self.speaking_child.lock() else {
                return Ok(());
            };
            match slot.as_mut() {
                None => return Ok(()),
                Some(child) => match child.try_wait() {
                    Ok(Some(_)) => {
                        *slot = None;
                        return Ok(());
                    }
                    Ok(None) => {}
                    Err(err) => {
                        *slot = None;
                        return Err(CanvasError::audio(format!("tts process failed: {err}")));
                    }
                },
            }
        }
    }

    fn cancel_speech(&self) {
        if let Ok(mut slot) = self.speaking_child.lock() {
            if let Some(mut child) = slot.take() {
                let _ = child.start_kill();
            }
        }
    }
}

/// Owns the rodio output stream and the single looping source.
fn output_thread(rx: std::sync::mpsc::Receiver<MusicCommand>) {
    let Ok((_stream, handle)) = OutputStream::try_default() else {
        tracing::warn!("no audio output device, music disabled");
        while rx.recv().is_ok() {}
        return;
    };

    let mut sink: Option<Sink> = None;
    while let Ok(command) = rx.recv() {
        match command {
            MusicCommand::Start(path) => {
                // Stop-and-release the previous source before the next one
                // becomes audible.
                if let Some(old) = sink.take() {
                    old.stop();
                }
                match open_looping_source(&path, &handle) {
                    Ok(new_sink) => sink = Some(new_sink),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "failed to start music");
                    }
                }
            }
            MusicCommand::Stop => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
            }
            MusicCommand::SetVolume(volume) => {
                if let Some(sink) = sink.as_ref() {
                    sink.set_volume(volume);
                }
            }
        }
    }

    if let Some(old) = sink.take() {
        old.stop();
    }
}

fn open_looping_source(path: &Path, handle: &rodio::OutputStreamHandle) -> Result<Sink> {
    let file = File::open(path)?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|err| CanvasError::audio(format!("failed to decode {}: {err}", path.display())))?
        .repeat_infinite();

    let sink = Sink::try_new(handle)
        .map_err(|err| CanvasError::audio(format!("failed to open sink: {err}")))?;
    sink.set_volume(0.0);
    sink.append(source);
    Ok(sink)
}

/// Backend for environments without any audio capability: every operation
/// succeeds and does nothing, utterances complete immediately.
#[derive(Debug, Default)]
pub struct NullBackend;

#[async_trait]
impl AudioBackend for NullBackend {
    fn start_music(&self, _mood: Mood) -> Result<()> {
        Ok(())
    }

    fn stop_music(&self) {}

    fn ramp_music_gain(&self, _target: f32, _duration: Duration) {}

    async fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn cancel_speech(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_resolution_prefers_mp3_then_ogg_then_wav() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tension.wav"), b"").unwrap();
        std::fs::write(dir.path().join("tension.ogg"), b"").unwrap();

        let backend = RodioBackend::new(dir.path(), None);
        let resolved = backend.resolve_asset(Mood::Tension).unwrap();
        assert_eq!(resolved.extension().unwrap(), "ogg");

        assert!(backend.resolve_asset(Mood::Epiphany).is_none());
    }

    #[tokio::test]
    async fn speak_without_program_is_silent_noop() {
        let backend = RodioBackend::new("/nonexistent", None);
        backend.speak("unvoiced").await.unwrap();
    }

    #[tokio::test]
    async fn ramp_start_point_follows_sent_gain_not_target() {
        let backend = RodioBackend::new("/nonexistent", None);

        // A long ramp: the tracked gain moves step by step, it does not
        // jump to the target up front.
        backend.ramp_music_gain(1.0, Duration::from_secs(60));
        assert_eq!(*backend.current_volume.lock().unwrap(), 0.0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let mid = *backend.current_volume.lock().unwrap();
        assert!(mid > 0.0 && mid < 0.01, "gain after a few steps: {mid}");

        // A superseding ramp descends from the gain actually sent, not
        // from the previous ramp's target.
        backend.ramp_music_gain(0.0, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(300)).await;
        let after = *backend.current_volume.lock().unwrap();
        assert!(after < mid, "descends from {mid}, got {after}");
        assert!(after < 0.01);
    }
}
