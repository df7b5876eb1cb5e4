//! Shared canvas session state.
//!
//! The state is a process-wide singleton per session, shared between the
//! pipeline, detached continuations and the presentation layer. Mutations
//! go through [`CanvasState::apply`] under the write lock, so each
//! transition runs to completion before the next callback resumes.

use std::sync::Arc;
use tokio::sync::RwLock;

use canvas_core::state::{CanvasAction, CanvasState};
use canvas_core::view::ViewState;

/// Handle to the shared canvas state. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<RwLock<CanvasState>>,
}

impl SessionHandle {
    /// Creates a fresh session with the initial canvas state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CanvasState::new())),
        }
    }

    /// Applies a single transition.
    pub async fn apply(&self, action: CanvasAction) {
        self.state.write().await.apply(action);
    }

    /// Applies several transitions atomically under one lock acquisition.
    pub async fn apply_all(&self, actions: impl IntoIterator<Item = CanvasAction>) {
        let mut state = self.state.write().await;
        for action in actions {
            state.apply(action);
        }
    }

    /// Runs a closure with mutable access under one write-lock
    /// acquisition. Used where a request context must be captured in the
    /// same transition that mutates the state.
    pub async fn update<R>(&self, f: impl FnOnce(&mut CanvasState) -> R) -> R {
        f(&mut *self.state.write().await)
    }

    /// Runs a read-only closure against the current state.
    pub async fn read<R>(&self, f: impl FnOnce(&CanvasState) -> R) -> R {
        f(&*self.state.read().await)
    }

    /// Returns a full clone of the state, the snapshot handed to the
    /// presentation layer after every transition.
    pub async fn snapshot(&self) -> CanvasState {
        self.state.read().await.clone()
    }

    /// Recenters the camera on the world origin for the given viewport,
    /// used once at session start.
    pub async fn center_initial_view(&self, viewport_width: f64, viewport_height: f64) {
        self.apply(CanvasAction::SetView(ViewState::centered_on(
            0.0,
            0.0,
            1.0,
            viewport_width,
            viewport_height,
        )))
        .await;
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}
