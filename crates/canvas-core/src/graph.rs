//! The node/edge graph and its selection set.
//!
//! Pure data plus transition functions; no I/O. Nodes are evidence pieces
//! placed in world coordinates, edges are directed parent→child links
//! created together with their target node and never mutated afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A piece of evidence placed on the canvas.
///
/// Created atomically with `is_loading_image = true` and no `image_url`;
/// mutated in place (by id) once image generation resolves. The id is
/// unique and stable for the node's lifetime and never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub title: String,
    pub insight: String,
    /// Keyword fed to the image collaborator.
    pub visual_keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_loading_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl NodeData {
    /// Creates a new node in the loading-image state.
    pub fn new(
        x: f64,
        y: f64,
        title: impl Into<String>,
        insight: impl Into<String>,
        visual_keyword: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            id: format!("node-{}", Uuid::new_v4()),
            x,
            y,
            title: title.into(),
            insight: insight.into(),
            visual_keyword: visual_keyword.into(),
            image_url: None,
            is_loading_image: true,
            parent_id,
        }
    }
}

/// A directed link from a parent node to a newly synthesized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EdgeData {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id: format!("edge-{}", Uuid::new_v4()),
            source_id: source_id.into(),
            target_id: target_id.into(),
            label,
        }
    }
}

/// An explicit patch for the updatable fields of a node.
///
/// Applied via [`GraphStore::apply_patch`] with patch-wins precedence:
/// a `Some` field replaces the node's value, a `None` field is left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    pub image_url: Option<String>,
    pub is_loading_image: Option<bool>,
}

impl NodePatch {
    /// Patch for a successfully generated image.
    pub fn image_ready(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            is_loading_image: Some(false),
        }
    }

    /// Patch for a failed image generation: only clears the loading flag,
    /// leaving `image_url` untouched.
    pub fn image_failed() -> Self {
        Self {
            image_url: None,
            is_loading_image: Some(false),
        }
    }
}

/// The node/edge collection plus the ordered selection set.
///
/// Selection order matters: the last-selected id resolves the "primary
/// parent" when a new node is synthesized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStore {
    pub nodes: Vec<NodeData>,
    pub edges: Vec<EdgeData>,
    /// Ordered node-id selection (insertion order).
    pub selected_node_ids: Vec<String>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node (and its edge, if any) and makes the new node the
    /// sole selection, regardless of prior selection size.
    ///
    /// The caller guarantees id uniqueness; no validation is performed.
    pub fn add_node(&mut self, node: NodeData, edge: Option<EdgeData>) {
        self.selected_node_ids = vec![node.id.clone()];
        self.nodes.push(node);
        if let Some(edge) = edge {
            self.edges.push(edge);
        }
    }

    /// Merges a patch into the node matching `id`. No-op if absent.
    pub fn apply_patch(&mut self, id: &str, patch: NodePatch) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            if let Some(url) = patch.image_url {
                node.image_url = Some(url);
            }
            if let Some(loading) = patch.is_loading_image {
                node.is_loading_image = loading;
            }
        }
    }

    /// Absolute position replace for one node, used during drag.
    pub fn update_position(&mut self, id: &str, x: f64, y: f64) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.x = x;
            node.y = y;
        }
    }

    /// Absolute selection replace.
    pub fn set_selection(&mut self, ids: Vec<String>) {
        self.selected_node_ids = ids;
    }

    /// Applies the click-selection policy for a click on node `id`.
    ///
    /// Shift-click toggles membership. A plain click on an unselected node
    /// (or while more than one node is selected) collapses the selection to
    /// just that node; a plain click on the sole already-selected node is a
    /// no-op and keeps it selected.
    pub fn click_select(&mut self, id: &str, shift: bool) {
        if shift {
            if let Some(pos) = self.selected_node_ids.iter().position(|s| s == id) {
                self.selected_node_ids.remove(pos);
            } else {
                self.selected_node_ids.push(id.to_string());
            }
        } else if !self.selected_node_ids.iter().any(|s| s == id)
            || self.selected_node_ids.len() > 1
        {
            self.selected_node_ids = vec![id.to_string()];
        }
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns the selected nodes in selection order. Ids without a backing
    /// node are skipped.
    pub fn selected_nodes(&self) -> Vec<&NodeData> {
        self.selected_node_ids
            .iter()
            .filter_map(|id| self.node(id))
            .collect()
    }

    /// The most recently selected node, used as the anchor for placing a
    /// newly synthesized node.
    pub fn primary_parent(&self) -> Option<&NodeData> {
        self.selected_node_ids
            .iter()
            .rev()
            .find_map(|id| self.node(id))
    }
}
