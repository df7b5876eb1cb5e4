//! Full canvas state and its action reducer.
//!
//! Every presentation-facing transition goes through [`CanvasState::apply`]
//! so the snapshot handed to the renderer is always internally consistent:
//! camera, graph, selection, chat log and the ambient flags move together.

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::graph::{EdgeData, GraphStore, NodeData, NodePatch};
use crate::mood::Language;
use crate::view::{Point, ViewState};

/// The complete client-side state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    #[serde(flatten)]
    pub graph: GraphStore,
    pub view: ViewState,
    pub chat_history: Vec<ChatMessage>,
    /// True while a reasoning request is in flight for the current epoch.
    pub is_thinking: bool,
    /// Voice output toggle.
    pub is_speaking: bool,
    /// Ambient music toggle.
    pub is_music_on: bool,
    pub language: Language,
}

impl CanvasState {
    /// Initial state: empty canvas, voice and music enabled.
    pub fn new() -> Self {
        Self {
            is_speaking: true,
            is_music_on: true,
            ..Self::default()
        }
    }

    /// Applies one action. Runs to completion synchronously; callers at
    /// suspension points re-acquire the state before applying.
    pub fn apply(&mut self, action: CanvasAction) {
        match action {
            CanvasAction::Pan { dx, dy } => self.view.pan(dx, dy),
            CanvasAction::Zoom { delta, center } => self.view.zoom(delta, center),
            CanvasAction::SetView(view) => self.view = view,
            CanvasAction::AddNode { node, edge } => self.graph.add_node(node, edge),
            CanvasAction::UpdateNodeData { id, patch } => self.graph.apply_patch(&id, patch),
            CanvasAction::UpdateNodePos { id, x, y } => self.graph.update_position(&id, x, y),
            CanvasAction::SetSelection(ids) => self.graph.set_selection(ids),
            CanvasAction::ClickSelect { id, shift } => self.graph.click_select(&id, shift),
            CanvasAction::SetThinking(flag) => self.is_thinking = flag,
            CanvasAction::AddChatMessage(message) => self.chat_history.push(message),
            CanvasAction::SetSpeaking(flag) => self.is_speaking = flag,
            CanvasAction::SetMusic(flag) => self.is_music_on = flag,
            CanvasAction::SetLanguage(language) => self.language = language,
        }
    }
}

/// A single state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasAction {
    Pan { dx: f64, dy: f64 },
    Zoom { delta: f64, center: Point },
    SetView(ViewState),
    AddNode { node: NodeData, edge: Option<EdgeData> },
    UpdateNodeData { id: String, patch: NodePatch },
    UpdateNodePos { id: String, x: f64, y: f64 },
    SetSelection(Vec<String>),
    ClickSelect { id: String, shift: bool },
    SetThinking(bool),
    AddChatMessage(ChatMessage),
    SetSpeaking(bool),
    SetMusic(bool),
    SetLanguage(Language),
}
