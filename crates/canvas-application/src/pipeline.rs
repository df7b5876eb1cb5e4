//! The conversation pipeline.
//!
//! Orchestrates one request/response cycle against the reasoning
//! collaborator: optimistic chat append, the thinking flag, reconciliation
//! of the response into graph and camera state, audio side effects, and the
//! detached image continuation. Superseded requests are arbitrated by a
//! monotonically increasing epoch counter - a response whose epoch is no
//! longer current is discarded without touching chat, graph or the
//! thinking flag.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use canvas_audio::AudioEngine;
use canvas_core::chat::{ChatMessage, MessageRole, ProfilingOption};
use canvas_core::graph::{EdgeData, NodeData, NodePatch};
use canvas_core::mood::Language;
use canvas_core::placement::place_node;
use canvas_core::state::CanvasAction;
use canvas_core::view::ViewState;
use canvas_interaction::{
    ChatTurn, ContextNode, ImageAgent, ImageOutcome, ReasoningAgent, ReasoningRequest,
};
use std::sync::Arc;

use crate::session::SessionHandle;

/// Edge label used when the response does not suggest one.
const DEFAULT_EDGE_LABEL: &str = "Connected";

/// Model message substituted when the reasoning request itself fails.
const CONNECTION_LOST_MESSAGE: &str =
    "Connection to the mind palace lost. Please check your network and try again.";

/// Terminal state of one user-initiated interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// The response (or its error fallback) was reconciled into the state.
    Completed,
    /// A newer interaction superseded this one; the response was discarded.
    Stale,
    /// Preconditions were not met (empty input, wrong selection size).
    NoOp,
}

/// Request-time context captured atomically with the optimistic append.
struct RequestContext {
    history: Vec<ChatTurn>,
    language: Language,
    context_nodes: Vec<ContextNode>,
    parent: Option<ParentRef>,
    canvas_has_nodes: bool,
    scale: f64,
    speaking_enabled: bool,
}

struct ParentRef {
    id: String,
    x: f64,
    y: f64,
}

/// Explicit context object for the interaction cycle; one per session.
pub struct ConversationPipeline {
    session: SessionHandle,
    reasoning: Arc<dyn ReasoningAgent>,
    imagery: Arc<dyn ImageAgent>,
    audio: AudioEngine,
    /// Identifies the latest in-flight request. The sole arbitration
    /// device for overlapping interactions; no locks needed beyond it.
    epoch: AtomicU64,
    rng: Mutex<StdRng>,
    viewport: (f64, f64),
}

impl ConversationPipeline {
    /// Creates a pipeline over the shared session state and collaborators.
    pub fn new(
        session: SessionHandle,
        reasoning: Arc<dyn ReasoningAgent>,
        imagery: Arc<dyn ImageAgent>,
        audio: AudioEngine,
        viewport: (f64, f64),
    ) -> Self {
        Self {
            session,
            reasoning,
            imagery,
            audio,
            epoch: AtomicU64::new(0),
            rng: Mutex::new(StdRng::from_entropy()),
            viewport,
        }
    }

    /// Replaces the placement random source with a seeded one, so tests
    /// can assert the angle/distance formula deterministically.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Returns the shared session handle.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Free-text submission. Blank input is a no-op.
    pub async fn submit_text(&self, input: &str) -> InteractionOutcome {
        if input.trim().is_empty() {
            return InteractionOutcome::NoOp;
        }
        self.interact(input.to_string(), input.to_string()).await
    }

    /// Profiling-option pick. The chat shows the choice while the backend
    /// receives the option's profiling marker prompt.
    pub async fn choose_option(&self, option: &ProfilingOption) -> InteractionOutcome {
        let keyword = &option.visual_keyword;
        self.interact(
            format!("[Identifying Suspect] I feel like: {keyword}"),
            format!("I choose: {keyword}"),
        )
        .await
    }

    /// Drill-down on the single selected node. No-op unless exactly one
    /// node is selected.
    pub async fn drill_down(&self) -> InteractionOutcome {
        let Some(title) = self.sole_selected_title().await else {
            return InteractionOutcome::NoOp;
        };
        let prompt =
            format!("[Investigating Clue] I want to explore \"{title}\" deeper. What's behind this?");
        self.interact(prompt.clone(), prompt).await
    }

    /// Free association on the single selected node. No-op unless exactly
    /// one node is selected.
    pub async fn free_associate(&self) -> InteractionOutcome {
        let Some(title) = self.sole_selected_title().await else {
            return InteractionOutcome::NoOp;
        };
        let prompt = format!("[Free Association] This clue (\"{title}\") makes me think of...");
        self.interact(prompt.clone(), prompt).await
    }

    /// Synthesis across the current selection. No-op with fewer than two
    /// selected nodes.
    pub async fn synthesize(&self) -> InteractionOutcome {
        let names = self
            .session
            .read(|s| {
                let selected = s.graph.selected_nodes();
                if selected.len() < 2 {
                    None
                } else {
                    Some(
                        selected
                            .iter()
                            .map(|n| n.title.as_str())
                            .collect::<Vec<_>>()
                            .join(" + "),
                    )
                }
            })
            .await;
        let Some(names) = names else {
            return InteractionOutcome::NoOp;
        };
        let prompt = format!(
            "[Synthesizing Evidence] I see a connection between: {names}. What is the hidden link?"
        );
        self.interact(prompt.clone(), prompt).await
    }

    /// Enables or disables voice output.
    pub async fn set_speaking(&self, enabled: bool) {
        self.session.apply(CanvasAction::SetSpeaking(enabled)).await;
    }

    /// Enables or disables the music bed, keeping the audio engine in sync
    /// with the state flag.
    pub async fn set_music(&self, enabled: bool) {
        self.session.apply(CanvasAction::SetMusic(enabled)).await;
        self.audio.set_music_enabled(enabled).await;
    }

    /// Switches the interface language used for subsequent requests.
    pub async fn set_language(&self, language: Language) {
        self.session.apply(CanvasAction::SetLanguage(language)).await;
    }

    async fn sole_selected_title(&self) -> Option<String> {
        self.session
            .read(|s| {
                let selected = s.graph.selected_nodes();
                if selected.len() == 1 {
                    Some(selected[0].title.clone())
                } else {
                    None
                }
            })
            .await
    }

    /// One full interaction cycle: `prompt` goes to the backend, `display`
    /// goes into the chat history.
    async fn interact(&self, prompt: String, display: String) -> InteractionOutcome {
        // Halt any reply still being spoken; the superseded network
        // request itself is not cancelled, only made unobservable.
        self.audio.stop_all_speech().await;

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Capture the request context and apply the optimistic mutations
        // in one transition.
        let ctx = self
            .session
            .update(|state| {
                let history = state
                    .chat_history
                    .iter()
                    .map(|m| ChatTurn {
                        role: match m.role {
                            MessageRole::User => "user".to_string(),
                            MessageRole::Model => "model".to_string(),
                        },
                        content: m.content.clone(),
                    })
                    .collect();
                let context_nodes = state
                    .graph
                    .selected_nodes()
                    .iter()
                    .map(|n| ContextNode {
                        title: n.title.clone(),
                        insight: n.insight.clone(),
                    })
                    .collect();
                let parent = state.graph.primary_parent().map(|n| ParentRef {
                    id: n.id.clone(),
                    x: n.x,
                    y: n.y,
                });
                let ctx = RequestContext {
                    history,
                    language: state.language,
                    context_nodes,
                    parent,
                    canvas_has_nodes: !state.graph.nodes.is_empty(),
                    scale: state.view.scale,
                    speaking_enabled: state.is_speaking,
                };

                state.apply(CanvasAction::AddChatMessage(ChatMessage::user(display)));
                state.apply(CanvasAction::SetThinking(true));
                ctx
            })
            .await;

        let request = ReasoningRequest {
            user_prompt: prompt,
            chat_history: ctx.history.clone(),
            language: ctx.language,
            context_nodes: ctx.context_nodes.clone(),
        };

        // The only suspension point of the cycle.
        let outcome = match self.reasoning.process(request).await {
            Ok(response) => {
                if self.epoch.load(Ordering::SeqCst) != epoch {
                    tracing::debug!(epoch, "discarding stale reasoning response");
                    InteractionOutcome::Stale
                } else {
                    self.reconcile(response, &ctx, epoch).await;
                    InteractionOutcome::Completed
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "reasoning request failed");
                self.session
                    .apply(CanvasAction::AddChatMessage(ChatMessage::model(
                        CONNECTION_LOST_MESSAGE,
                    )))
                    .await;
                InteractionOutcome::Completed
            }
        };

        // Final step on every path; the epoch gate keeps a superseded
        // interaction away from the newer interaction's thinking flag.
        if self.epoch.load(Ordering::SeqCst) == epoch {
            self.session.apply(CanvasAction::SetThinking(false)).await;
        }
        outcome
    }

    async fn reconcile(
        &self,
        response: canvas_interaction::AiResponse,
        ctx: &RequestContext,
        epoch: u64,
    ) {
        let model_msg = ChatMessage::model(response.chat_response.clone()).with_options(
            response.profiling_options.clone(),
            response.options_header.clone(),
        );
        self.session
            .apply(CanvasAction::AddChatMessage(model_msg))
            .await;

        self.audio.set_mood(response.soundtrack_mood).await;
        if ctx.speaking_enabled && self.epoch.load(Ordering::SeqCst) == epoch {
            self.audio.enqueue_speech(response.chat_response).await;
        }

        if !response.visualization.should_create_node {
            return;
        }
        let viz = response.visualization;

        let (x, y) = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            place_node(
                ctx.parent.as_ref().map(|p| (p.x, p.y)),
                ctx.canvas_has_nodes,
                &mut *rng,
            )
        };

        let node = NodeData::new(
            x,
            y,
            viz.title,
            viz.insight,
            viz.visual_keyword.clone(),
            ctx.parent.as_ref().map(|p| p.id.clone()),
        );
        let node_id = node.id.clone();
        let edge = ctx.parent.as_ref().map(|p| {
            EdgeData::new(
                p.id.clone(),
                node_id.clone(),
                Some(
                    viz.connection_label
                        .unwrap_or_else(|| DEFAULT_EDGE_LABEL.to_string()),
                ),
            )
        });

        self.session
            .apply_all([
                CanvasAction::AddNode { node, edge },
                CanvasAction::SetView(ViewState::centered_on(
                    x,
                    y,
                    ctx.scale,
                    self.viewport.0,
                    self.viewport.1,
                )),
            ])
            .await;

        self.spawn_image_task(node_id, viz.visual_keyword);
    }

    /// Detached image continuation. Deliberately carries no epoch check:
    /// the patch targets a node id, and node identity outlives the
    /// conversation epoch, so a slow image for a superseded interaction
    /// still lands on its node.
    fn spawn_image_task(&self, node_id: String, keyword: String) {
        let session = self.session.clone();
        let imagery = self.imagery.clone();
        tokio::spawn(async move {
            let patch = match imagery.generate(&keyword).await {
                ImageOutcome::Generated(url) => NodePatch::image_ready(url),
                ImageOutcome::Unavailable => NodePatch::image_failed(),
            };
            session
                .apply(CanvasAction::UpdateNodeData { id: node_id, patch })
                .await;
        });
    }
}
