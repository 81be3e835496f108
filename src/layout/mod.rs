//! Layout strategies: the delegate 2D force simulation and the custom 3D
//! N-body simulation with rotation projection.

pub mod force2d;
pub mod nbody3d;
pub mod projection;
pub mod seed;

use clap::ValueEnum;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::graph::{NodeKey, VisibleSubgraph};

pub use force2d::{Force2dLayout, ForceParams};
pub use nbody3d::{NBodyLayout, NBodyParams};
pub use projection::Rotation;

/// Screen-space positions keyed by node.
pub type Positions = HashMap<NodeKey, Vec2>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    #[value(name = "2d")]
    #[serde(rename = "2d")]
    TwoD,
    #[value(name = "3d")]
    #[serde(rename = "3d")]
    ThreeD,
}

impl std::fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutMode::TwoD => write!(f, "2d"),
            LayoutMode::ThreeD => write!(f, "3d"),
        }
    }
}

/// Visible nodes interned to dense indices, with edges as index pairs.
#[derive(Debug, Clone, Default)]
pub struct LayoutInput {
    pub keys: Vec<NodeKey>,
    pub edges: Vec<(usize, usize)>,
    pub degrees: Vec<usize>,
    /// Changes whenever the node or edge set changes.
    pub generation: u64,
}

impl LayoutInput {
    pub fn from_visible(subgraph: &VisibleSubgraph) -> Self {
        let keys: Vec<NodeKey> = subgraph.visible_nodes.iter().map(|n| n.key()).collect();
        let index: HashMap<&NodeKey, usize> = keys.iter().enumerate().map(|(i, k)| (k, i)).collect();

        let mut degrees = vec![0usize; keys.len()];
        let edges: Vec<(usize, usize)> = subgraph
            .visible_edges
            .iter()
            .filter_map(|e| match (index.get(&e.from), index.get(&e.to)) {
                (Some(&a), Some(&b)) if a != b => Some((a, b)),
                _ => None,
            })
            .inspect(|&(a, b)| {
                degrees[a] += 1;
                degrees[b] += 1;
            })
            .collect();

        Self {
            keys,
            edges,
            degrees,
            generation: subgraph.generation,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// A continuously refinable layout.
///
/// `step` advances by one frame. Nodes already known to the engine keep their
/// state; new nodes seed from `prior` when cached, otherwise from a hash of
/// their key.
pub trait LayoutEngine {
    fn name(&self) -> &'static str;

    fn step(&mut self, input: &LayoutInput, prior: &Positions) -> Positions;

    fn is_settled(&self) -> bool;

    /// Forget all node state.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, GraphData, GraphStore, Node, SubgraphResolver, VariantKind, VariantRegistry};
    use std::collections::BTreeSet;

    #[test]
    fn test_input_from_visible_drops_self_loops() {
        let store = GraphStore::from_data(GraphData {
            nodes: vec![Node::new("Policy", "1"), Node::new("State", "CA")],
            edges: vec![
                Edge::new(NodeKey::new("Policy", "1"), NodeKey::new("State", "CA"), "r"),
                Edge::new(NodeKey::new("Policy", "1"), NodeKey::new("Policy", "1"), "r"),
            ],
        });
        let sub = SubgraphResolver::new(VariantRegistry::new()).resolve(
            &store,
            VariantKind::Policy,
            &BTreeSet::new(),
        );
        let input = LayoutInput::from_visible(&sub);
        assert_eq!(input.len(), 2);
        assert_eq!(input.edges, vec![(0, 1)]);
        assert_eq!(input.degrees, vec![1, 1]);
        assert_eq!(input.generation, sub.generation);
    }
}
