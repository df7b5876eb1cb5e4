//! Application layer for Inner Canvas: the shared session state and the
//! conversation pipeline orchestrating reasoning, placement, imagery and
//! audio side effects.

pub mod pipeline;
pub mod session;

pub use pipeline::{ConversationPipeline, InteractionOutcome};
pub use session::SessionHandle;
