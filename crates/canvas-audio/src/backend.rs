//! The seam between the audio engine and the actual sound hardware.
//!
//! The engine only ever issues source-lifecycle and gain-ramp commands
//! through [`AudioBackend`], which keeps the queue/ducking/replace logic
//! testable without a sound card: tests plug in a recording backend and
//! assert on the call order.

use async_trait::async_trait;
use canvas_core::Result;
use canvas_core::mood::Mood;
use std::time::Duration;

/// Low-level audio operations consumed by the engine.
///
/// All operations are best-effort: implementations log and return rather
/// than panic when the underlying capability is unavailable.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Starts looping the track for `mood`, initially silent. Any
    /// previously started source must be stopped and released first, even
    /// when called back-to-back rapidly.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable asset exists for the mood or the
    /// output device is gone. Callers treat this as non-fatal.
    fn start_music(&self, mood: Mood) -> Result<()>;

    /// Stops and releases the current music source, if any.
    fn stop_music(&self);

    /// Ramps the music gain linearly to `target` over `duration`,
    /// superseding any ramp still in flight.
    fn ramp_music_gain(&self, target: f32, duration: Duration);

    /// Speaks one utterance, resolving when playback finishes naturally,
    /// errors out, or is cancelled. Never holds the queue hostage.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis fails to start; the queue logs it and
    /// moves on to the next entry.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Forcibly halts the utterance currently being spoken, if any. The
    /// pending [`AudioBackend::speak`] call resolves promptly.
    fn cancel_speech(&self);
}
