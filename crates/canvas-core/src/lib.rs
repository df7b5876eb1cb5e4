//! Core domain for Inner Canvas: camera math, the node/edge graph, the
//! chat log, ambient moods and the canvas state reducer. Pure data and
//! transition functions; no I/O lives here.

pub mod chat;
pub mod error;
pub mod graph;
pub mod mood;
pub mod placement;
pub mod state;
pub mod view;

// Re-export common error type
pub use error::{CanvasError, Result};
