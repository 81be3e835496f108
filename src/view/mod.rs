//! One exploration session: graph store, resolver, layouts, selection and
//! rendering owned together.

pub mod render;
pub mod selection;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::graph::{GraphData, GraphStore, NodeKey, SubgraphResolver, VariantKind, VariantRegistry, VisibleSubgraph};
use crate::layout::{
    Force2dLayout, ForceParams, LayoutEngine, LayoutInput, LayoutMode, NBodyLayout, NBodyParams, Positions,
    Rotation,
};

pub use render::{Palette, RenderAdapter, RenderFrame, RenderSettings};
pub use selection::{ClickAction, ClickOutcome, SelectionController};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub mode: LayoutMode,
    pub double_click_ms: u64,
    #[serde(flatten)]
    pub render: RenderSettings,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            mode: LayoutMode::TwoD,
            double_click_ms: selection::DEFAULT_DOUBLE_CLICK_MS,
            render: RenderSettings::default(),
        }
    }
}

pub struct ExplorerView {
    id: Uuid,
    store: GraphStore,
    resolver: SubgraphResolver,
    kind: VariantKind,
    hidden: BTreeSet<String>,
    mode: LayoutMode,
    force2d: Force2dLayout,
    nbody: NBodyLayout,
    selection: SelectionController,
    render: RenderAdapter,
    current: Option<Arc<VisibleSubgraph>>,
}

impl ExplorerView {
    pub fn new(variants: VariantRegistry, kind: VariantKind) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, kind = %kind, "view session created");
        Self {
            id,
            store: GraphStore::new(),
            resolver: SubgraphResolver::new(variants),
            kind,
            hidden: BTreeSet::new(),
            mode: LayoutMode::TwoD,
            force2d: Force2dLayout::new(ForceParams::default()),
            nbody: NBodyLayout::new(NBodyParams::default()),
            selection: SelectionController::default(),
            render: RenderAdapter::default(),
            current: None,
        }
    }

    pub fn with_settings(mut self, settings: ViewSettings) -> Self {
        self.mode = settings.mode;
        self.selection = SelectionController::new(settings.double_click_ms);
        self.render = RenderAdapter::new(settings.render);
        self
    }

    pub fn with_force_params(mut self, params: ForceParams) -> Self {
        self.force2d.set_params(params);
        self
    }

    pub fn with_nbody_params(mut self, params: NBodyParams) -> Self {
        self.nbody.set_params(params);
        self
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    pub fn hidden_types(&self) -> &BTreeSet<String> {
        &self.hidden
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn render(&self) -> &RenderAdapter {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut RenderAdapter {
        &mut self.render
    }

    pub fn rotation_mut(&mut self) -> &mut Rotation {
        self.nbody.rotation_mut()
    }

    pub fn nbody_mut(&mut self) -> &mut NBodyLayout {
        &mut self.nbody
    }

    /// Load a fetch result, replacing or extending the current graph.
    pub fn ingest(&mut self, data: GraphData, merge: bool) {
        let (nodes, edges) = (data.nodes.len(), data.edges.len());
        if merge {
            self.store.merge(data);
        } else {
            self.store.replace(data);
        }
        info!(
            session = %self.id,
            nodes,
            edges,
            merge,
            total_nodes = self.store.node_count(),
            "graph ingested"
        );
    }

    pub fn set_mode(&mut self, mode: LayoutMode) {
        self.mode = mode;
    }

    pub fn set_types_hidden<I, S>(&mut self, types: I, hidden: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for t in types {
            let t = t.into();
            if hidden {
                self.hidden.insert(t);
            } else {
                self.hidden.remove(&t);
            }
        }
    }

    /// Resolve the current view, recovering from an all-hidden mask and
    /// pruning the selection to what still exists.
    pub fn resolve(&mut self) -> Arc<VisibleSubgraph> {
        let subgraph = self.resolver.resolve(&self.store, self.kind, &self.hidden);
        if subgraph.mask_recovered {
            debug!(session = %self.id, hidden = ?self.hidden, "clearing recovered hide mask");
            self.hidden.clear();
        }

        let changed = self
            .current
            .as_ref()
            .is_none_or(|c| c.generation != subgraph.generation);
        if changed {
            let pruned = self.selection.prune(&subgraph.connected_node_keys);
            if pruned > 0 {
                debug!(session = %self.id, pruned, "selection pruned");
            }
        }
        self.current = Some(subgraph.clone());
        subgraph
    }

    pub fn click(&mut self, key: &NodeKey, now_ms: u64) -> ClickOutcome {
        let subgraph = self.resolve();
        self.selection.click(key, now_ms, &subgraph)
    }

    pub fn poll(&mut self, now_ms: u64) -> Option<NodeKey> {
        self.selection.poll(now_ms)
    }

    pub fn toggle_pin(&mut self) -> bool {
        self.selection.toggle_pin()
    }

    /// Hover a node. Only visible nodes can be hovered; returns whether the
    /// hover took.
    pub fn set_hover(&mut self, key: Option<&NodeKey>) -> bool {
        let subgraph = self.resolve();
        match key {
            Some(key) if subgraph.is_visible(key) => {
                self.selection.set_hover(Some(key.clone()));
                true
            }
            Some(key) => {
                debug!(session = %self.id, node = %key, "hover ignored for hidden node");
                self.selection.set_hover(None);
                false
            }
            None => {
                self.selection.set_hover(None);
                true
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        debug!(session = %self.id, "selection cleared");
    }

    /// Turn selection mode on or off; clicks are ignored while it is off.
    pub fn set_selection_enabled(&mut self, enabled: bool) {
        self.selection.set_enabled(enabled);
    }

    /// Advance the active layout by one frame and render it.
    pub fn frame(&mut self, now_ms: u64) -> RenderFrame {
        self.selection.poll(now_ms);
        let subgraph = self.resolve();
        let input = LayoutInput::from_visible(&subgraph);

        let engine: &mut dyn LayoutEngine = match self.mode {
            LayoutMode::TwoD => &mut self.force2d,
            LayoutMode::ThreeD => &mut self.nbody,
        };
        let positions: Positions = engine.step(&input, self.render.cache());
        let settled = engine.is_settled();
        if settled {
            debug!(session = %self.id, engine = engine.name(), "layout settled");
        }

        self.render.build_frame(
            &self.id.to_string(),
            self.mode,
            &subgraph,
            &positions,
            &self.selection,
            settled,
        )
    }

    /// Run up to `frames` frames, stopping early once the layout settles.
    pub fn run(&mut self, frames: usize, now_ms: u64) -> RenderFrame {
        let mut frame = self.frame(now_ms);
        for _ in 1..frames {
            if frame.settled {
                break;
            }
            frame = self.frame(now_ms);
        }
        frame
    }

    pub fn dispose(&mut self) {
        self.selection.dispose();
        self.render.clear_cache();
        self.force2d.reset();
        self.nbody.reset();
        self.resolver.invalidate();
        self.current = None;
        info!(session = %self.id, "view session disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn key(s: &str) -> NodeKey {
        s.parse().unwrap()
    }

    fn data() -> GraphData {
        GraphData {
            nodes: vec![
                Node::new("Policy", "1"),
                Node::new("State", "CA"),
                Node::new("Keyword", "ai"),
            ],
            edges: vec![
                Edge::new(key("Policy:1"), key("State:CA"), "applies_to"),
                Edge::new(key("Policy:1"), key("Keyword:ai"), "mentions"),
            ],
        }
    }

    fn view() -> ExplorerView {
        let mut v = ExplorerView::new(VariantRegistry::new(), VariantKind::Policy);
        v.ingest(data(), false);
        v
    }

    #[test]
    fn test_mask_recovery_clears_hidden_types() {
        let mut v = view();
        v.set_types_hidden(["Policy", "State", "Keyword"], true);
        let sub = v.resolve();
        assert!(sub.mask_recovered);
        assert_eq!(sub.visible_nodes.len(), 3);
        assert!(v.hidden_types().is_empty());
    }

    #[test]
    fn test_hide_and_show_types() {
        let mut v = view();
        v.set_types_hidden(["Keyword"], true);
        assert_eq!(v.resolve().visible_nodes.len(), 2);
        v.set_types_hidden(["Keyword"], false);
        assert_eq!(v.resolve().visible_nodes.len(), 3);
    }

    fn opacity(frame: &RenderFrame, k: &str) -> f32 {
        frame.nodes.iter().find(|n| n.key == key(k)).unwrap().opacity
    }

    #[test]
    fn test_pinned_focus_follows_hover() {
        let mut v = view();
        v.click(&key("State:CA"), 0);
        v.poll(300);
        assert!(v.toggle_pin());
        let dim = 0.9 * 0.15;

        let frame = v.frame(300);
        assert_eq!(opacity(&frame, "State:CA"), 0.9);
        assert!((opacity(&frame, "Policy:1") - dim).abs() < 1e-6);

        // Hovered selected node lights its neighbors
        assert!(v.set_hover(Some(&key("State:CA"))));
        let frame = v.frame(300);
        assert_eq!(opacity(&frame, "Policy:1"), 0.9);
        assert!((opacity(&frame, "Keyword:ai") - dim).abs() < 1e-6);
        assert!(frame.nodes.iter().any(|n| n.hovered && n.key == key("State:CA")));

        // Hovered unselected node does not
        assert!(v.set_hover(Some(&key("Keyword:ai"))));
        let frame = v.frame(300);
        assert!((opacity(&frame, "Policy:1") - dim).abs() < 1e-6);

        v.clear_selection();
        let frame = v.frame(300);
        assert!(!frame.pinned);
        assert!(frame.nodes.iter().all(|n| n.opacity == 0.9));
    }

    #[test]
    fn test_hover_rejects_hidden_node() {
        let mut v = view();
        v.set_types_hidden(["Keyword"], true);
        assert!(!v.set_hover(Some(&key("Keyword:ai"))));
        assert!(v.selection().hover().is_none());
        assert!(v.set_hover(Some(&key("Policy:1"))));
        assert!(v.set_hover(None));
        assert!(v.selection().hover().is_none());
    }

    #[test]
    fn test_selection_mode_off_ignores_clicks() {
        let mut v = view();
        v.set_selection_enabled(false);
        assert_eq!(v.click(&key("Policy:1"), 0).action, ClickAction::Ignored);
        v.poll(1000);
        assert!(v.selection().selected().is_empty());

        v.set_selection_enabled(true);
        assert_eq!(v.click(&key("Policy:1"), 2000).action, ClickAction::Armed);
    }

    #[test]
    fn test_reingest_prunes_selection() {
        let mut v = view();
        v.click(&key("State:CA"), 0);
        v.poll(300);
        assert!(v.selection().is_selected(&key("State:CA")));

        v.ingest(
            GraphData {
                nodes: vec![Node::new("Policy", "1")],
                edges: vec![],
            },
            false,
        );
        v.resolve();
        assert!(v.selection().selected().is_empty());
    }

    #[test]
    fn test_merge_keeps_selection() {
        let mut v = view();
        v.click(&key("State:CA"), 0);
        v.poll(300);
        v.ingest(
            GraphData {
                nodes: vec![Node::new("State", "NY")],
                edges: vec![Edge::new(key("Policy:1"), key("State:NY"), "applies_to")],
            },
            true,
        );
        assert_eq!(v.resolve().connected_nodes.len(), 4);
        assert!(v.selection().is_selected(&key("State:CA")));
    }

    #[test]
    fn test_frames_in_both_modes() {
        let mut v = view();
        let frame = v.frame(0);
        assert_eq!(frame.mode, LayoutMode::TwoD);
        assert_eq!(frame.nodes.len(), 3);
        assert_eq!(v.render().cache().len(), 3);

        v.set_mode(LayoutMode::ThreeD);
        v.rotation_mut().yaw = 30.0;
        let frame = v.run(20, 0);
        assert_eq!(frame.mode, LayoutMode::ThreeD);
        assert_eq!(frame.nodes.len(), 3);
        let cx: f32 = frame.nodes.iter().map(|n| n.x).sum::<f32>() / 3.0;
        assert!(cx.abs() < 1e-2);
    }

    #[test]
    fn test_dispose_clears_session_state() {
        let mut v = view();
        v.frame(0);
        v.click(&key("Policy:1"), 10);
        v.dispose();
        assert!(v.selection().pending().is_none());
        assert!(v.render().cache().is_empty());
    }
}
