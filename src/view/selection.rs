//! Click / double-click selection state machine with pinned focus.

use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::graph::{NodeKey, VisibleSubgraph};

pub const DEFAULT_DOUBLE_CLICK_MS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClick {
    pub key: NodeKey,
    pub at_ms: u64,
}

/// What a click did, after any expired pending click was fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    Ignored,
    /// Armed a pending single click.
    Armed,
    /// Cancelled a pending click on another node and armed this one.
    Rearmed { cancelled: NodeKey },
    /// Second click inside the window: neighbors toggled, node untouched.
    NeighborsToggled { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickOutcome {
    /// Pending click that had already expired and was fired first.
    pub fired: Option<NodeKey>,
    pub action: ClickAction,
}

#[derive(Debug, Clone)]
pub struct SelectionController {
    selected: BTreeSet<NodeKey>,
    pinned: bool,
    hover: Option<NodeKey>,
    pending: Option<PendingClick>,
    window_ms: u64,
    enabled: bool,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_CLICK_MS)
    }
}

impl SelectionController {
    pub fn new(window_ms: u64) -> Self {
        Self {
            selected: BTreeSet::new(),
            pinned: false,
            hover: None,
            pending: None,
            window_ms: window_ms.max(1),
            enabled: true,
        }
    }

    pub fn selected(&self) -> &BTreeSet<NodeKey> {
        &self.selected
    }

    pub fn is_selected(&self, key: &NodeKey) -> bool {
        self.selected.contains(key)
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn hover(&self) -> Option<&NodeKey> {
        self.hover.as_ref()
    }

    #[allow(dead_code)]
    pub fn pending(&self) -> Option<&PendingClick> {
        self.pending.as_ref()
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn selection mode on or off. Turning it off drops the pending click.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending = None;
        }
    }

    pub fn click(&mut self, key: &NodeKey, now_ms: u64, subgraph: &VisibleSubgraph) -> ClickOutcome {
        let fired = self.poll(now_ms);

        if !self.enabled || !subgraph.is_connected(key) {
            return ClickOutcome {
                fired,
                action: ClickAction::Ignored,
            };
        }

        let action = match self.pending.take() {
            Some(pending) if pending.key == *key => {
                let neighbors = subgraph.neighbors(key);
                for neighbor in &neighbors {
                    self.toggle(neighbor);
                }
                debug!(node = %key, count = neighbors.len(), "double click toggled neighbors");
                ClickAction::NeighborsToggled {
                    count: neighbors.len(),
                }
            }
            Some(pending) => {
                self.pending = Some(PendingClick {
                    key: key.clone(),
                    at_ms: now_ms,
                });
                ClickAction::Rearmed {
                    cancelled: pending.key,
                }
            }
            None => {
                self.pending = Some(PendingClick {
                    key: key.clone(),
                    at_ms: now_ms,
                });
                ClickAction::Armed
            }
        };

        ClickOutcome { fired, action }
    }

    /// Fire the pending click once its window has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<NodeKey> {
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|p| now_ms.saturating_sub(p.at_ms) >= self.window_ms);
        if !expired {
            return None;
        }
        let pending = self.pending.take()?;
        self.toggle(&pending.key);
        Some(pending.key)
    }

    fn toggle(&mut self, key: &NodeKey) {
        if !self.selected.remove(key) {
            self.selected.insert(key.clone());
        }
        if self.selected.is_empty() {
            self.pinned = false;
        }
    }

    /// Flip the pin. Returns the new state; pinning needs a selection.
    pub fn toggle_pin(&mut self) -> bool {
        self.pinned = !self.pinned && !self.selected.is_empty();
        self.pinned
    }

    pub fn set_hover(&mut self, key: Option<NodeKey>) {
        self.hover = key;
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.pinned = false;
        self.pending = None;
    }

    /// Drop everything that no longer exists in `connected`.
    pub fn prune(&mut self, connected: &HashSet<NodeKey>) -> usize {
        let before = self.selected.len();
        self.selected.retain(|k| connected.contains(k));
        if self.pending.as_ref().is_some_and(|p| !connected.contains(&p.key)) {
            self.pending = None;
        }
        if self.hover.as_ref().is_some_and(|h| !connected.contains(h)) {
            self.hover = None;
        }
        if self.selected.is_empty() {
            self.pinned = false;
        }
        before - self.selected.len()
    }

    /// Hovered node, when it is also selected.
    pub fn focused_hover(&self) -> Option<&NodeKey> {
        self.hover.as_ref().filter(|h| self.selected.contains(*h))
    }

    /// Whether `key` stays bright while pinned: it is selected, or adjacent
    /// to a hovered selected node.
    pub fn in_focus(&self, key: &NodeKey, subgraph: &VisibleSubgraph) -> bool {
        self.selected.contains(key)
            || self
                .focused_hover()
                .is_some_and(|hover| subgraph.is_adjacent(hover, key))
    }

    /// Edges stay bright between two selected nodes, or when they touch a
    /// hovered selected node.
    pub fn edge_in_focus(&self, from: &NodeKey, to: &NodeKey) -> bool {
        (self.selected.contains(from) && self.selected.contains(to))
            || self.focused_hover().is_some_and(|hover| hover == from || hover == to)
    }

    pub fn dispose(&mut self) {
        self.pending = None;
        self.hover = None;
    }
}
