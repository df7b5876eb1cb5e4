//! Audio subsystem for Inner Canvas: a single-flight spoken-line queue and
//! a looping mood-music bed, coupled only by their ducking relationship.

pub mod backend;
pub mod engine;
pub mod rodio_backend;

pub use backend::AudioBackend;
pub use engine::{AudioEngine, MUSIC_VOL_DUCKED, MUSIC_VOL_NORMAL};
pub use rodio_backend::{NullBackend, RodioBackend};
