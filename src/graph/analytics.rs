use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use std::collections::HashMap;

use super::model::NodeKey;
use super::resolver::VisibleSubgraph;

/// Summary statistics of a resolved view.
#[derive(Debug, Clone)]
pub struct ViewStats {
    pub connected_nodes: usize,
    pub connected_edges: usize,
    pub visible_nodes: usize,
    pub visible_edges: usize,
    pub components: usize,
    pub density: f64,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub top_degree: Vec<(NodeKey, String, usize)>,
    pub type_counts: Vec<(String, usize)>,
}

/// Number of connected components among the visible nodes.
pub fn visible_components(subgraph: &VisibleSubgraph) -> usize {
    let mut graph: UnGraph<(), ()> = UnGraph::new_undirected();
    let index: HashMap<NodeKey, _> = subgraph
        .visible_nodes
        .iter()
        .map(|n| (n.key(), graph.add_node(())))
        .collect();
    for edge in &subgraph.visible_edges {
        if let (Some(&a), Some(&b)) = (index.get(&edge.from), index.get(&edge.to)) {
            graph.add_edge(a, b, ());
        }
    }
    connected_components(&graph)
}

/// Visible node counts per type, largest first (ties by name).
pub fn type_distribution(subgraph: &VisibleSubgraph) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in &subgraph.visible_nodes {
        *counts.entry(node.node_type.as_str()).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(t, c)| (t.to_string(), c))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Compute full view statistics, listing the `top` best-connected nodes.
pub fn compute_stats(subgraph: &VisibleSubgraph, top: usize) -> ViewStats {
    let node_count = subgraph.visible_nodes.len();
    let edge_count = subgraph.visible_edges.len();
    let degrees = subgraph.visible_degrees();

    let density = if node_count > 1 {
        2.0 * edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    } else {
        0.0
    };
    let avg_degree = if node_count > 0 {
        degrees.values().sum::<usize>() as f64 / node_count as f64
    } else {
        0.0
    };
    let max_degree = degrees.values().copied().max().unwrap_or(0);

    let mut top_degree: Vec<(NodeKey, String, usize)> = subgraph
        .visible_nodes
        .iter()
        .map(|n| {
            let key = n.key();
            let degree = degrees.get(&key).copied().unwrap_or(0);
            (key, n.label(), degree)
        })
        .collect();
    top_degree.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
    top_degree.truncate(top);

    ViewStats {
        connected_nodes: subgraph.connected_nodes.len(),
        connected_edges: subgraph.connected_edges.len(),
        visible_nodes: node_count,
        visible_edges: edge_count,
        components: visible_components(subgraph),
        density,
        avg_degree,
        max_degree,
        top_degree,
        type_counts: type_distribution(subgraph),
    }
}
