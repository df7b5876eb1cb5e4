//! External collaborators for Inner Canvas: the reasoning and image
//! generation backends, specified only at their request/response boundary.

pub mod config;
pub mod imagery;
pub mod reasoning;

pub use config::BackendConfig;
pub use imagery::{HttpImageAgent, ImageAgent, ImageOutcome};
pub use reasoning::{
    AiResponse, ChatTurn, ContextNode, HttpReasoningAgent, ReasoningAgent, ReasoningRequest,
    Visualization,
};
