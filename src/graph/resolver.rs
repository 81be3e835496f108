use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::{Bfs, VisitMap};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::model::{Edge, GraphStore, Node, NodeKey};
use super::variant::{VariantConfig, VariantKind, VariantRegistry};

/// Connected (type-filtered, anchor-pruned) and visible (hide-masked)
/// portions of the session graph.
///
/// Connected nodes are interned into an undirected petgraph arena, so
/// adjacency queries never re-scan the edge list.
#[derive(Debug)]
pub struct VisibleSubgraph {
    pub kind: VariantKind,
    /// Resolver generation that produced this value; changes whenever inputs do.
    pub generation: u64,
    pub connected_nodes: Vec<Node>,
    pub connected_edges: Vec<Edge>,
    pub connected_node_keys: HashSet<NodeKey>,
    pub visible_nodes: Vec<Node>,
    pub visible_edges: Vec<Edge>,
    pub visible_node_keys: HashSet<NodeKey>,
    /// Anchor pruning ran (the kind has a prefix and at least one anchor exists).
    pub anchored: bool,
    /// The hide mask would have blanked the view and was ignored.
    pub mask_recovered: bool,
    /// Edges dropped because an endpoint is missing from the store.
    pub dangling_edges: usize,
    graph: UnGraph<NodeKey, ()>,
    index: HashMap<NodeKey, NodeIndex>,
}

impl VisibleSubgraph {
    /// Neighbors of `key` in the connected subgraph, excluding `key` itself.
    pub fn neighbors(&self, key: &NodeKey) -> Vec<NodeKey> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let unique: BTreeSet<&NodeKey> = self
            .graph
            .neighbors(idx)
            .filter(|&n| n != idx)
            .map(|n| &self.graph[n])
            .collect();
        unique.into_iter().cloned().collect()
    }

    /// Connected node by key. Arena indices follow `connected_nodes` order.
    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.index
            .get(key)
            .and_then(|idx| self.connected_nodes.get(idx.index()))
    }

    pub fn is_adjacent(&self, a: &NodeKey, b: &NodeKey) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&ia), Some(&ib)) => self.graph.find_edge(ia, ib).is_some(),
            _ => false,
        }
    }

    pub fn is_connected(&self, key: &NodeKey) -> bool {
        self.connected_node_keys.contains(key)
    }

    pub fn is_visible(&self, key: &NodeKey) -> bool {
        self.visible_node_keys.contains(key)
    }

    /// Degree of every visible node counted over visible edges only.
    pub fn visible_degrees(&self) -> HashMap<NodeKey, usize> {
        let mut degrees: HashMap<NodeKey, usize> = self
            .visible_nodes
            .iter()
            .map(|n| (n.key(), 0))
            .collect();
        for edge in &self.visible_edges {
            *degrees.entry(edge.from.clone()).or_default() += 1;
            *degrees.entry(edge.to.clone()).or_default() += 1;
        }
        degrees
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoKey {
    revision: u64,
    kind: VariantKind,
    hidden: BTreeSet<String>,
}

/// Resolves a store into a `VisibleSubgraph`, memoized on its inputs.
///
/// The memo is keyed on the store revision, so one resolver serves one store.
pub struct SubgraphResolver {
    variants: VariantRegistry,
    memo: Option<(MemoKey, Arc<VisibleSubgraph>)>,
    generation: u64,
}

impl SubgraphResolver {
    pub fn new(variants: VariantRegistry) -> Self {
        Self {
            variants,
            memo: None,
            generation: 0,
        }
    }

    /// Number of non-memoized resolutions performed so far.
    #[allow(dead_code)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop the memoized result.
    pub fn invalidate(&mut self) {
        self.memo = None;
    }

    pub fn resolve(
        &mut self,
        store: &GraphStore,
        kind: VariantKind,
        hidden: &BTreeSet<String>,
    ) -> Arc<VisibleSubgraph> {
        let key = MemoKey {
            revision: store.revision(),
            kind,
            hidden: hidden.clone(),
        };

        if let Some((memo_key, cached)) = &self.memo
            && *memo_key == key
        {
            return Arc::clone(cached);
        }

        self.generation += 1;
        let resolved = Arc::new(compute(
            self.variants.get(kind),
            store,
            kind,
            hidden,
            self.generation,
        ));
        self.memo = Some((key, Arc::clone(&resolved)));
        resolved
    }
}

fn compute(
    config: &VariantConfig,
    store: &GraphStore,
    kind: VariantKind,
    hidden: &BTreeSet<String>,
    generation: u64,
) -> VisibleSubgraph {
    let allowed = config.allowed_types();

    let variant_nodes: Vec<&Node> = store
        .nodes()
        .iter()
        .filter(|n| allowed.contains(n.node_type.as_str()))
        .collect();
    let variant_keys: HashSet<NodeKey> = variant_nodes.iter().map(|n| n.key()).collect();

    let (mut dangling, mut type_filtered) = (0usize, 0usize);
    let variant_edges: Vec<&Edge> = store
        .edges()
        .iter()
        .filter(|e| {
            if variant_keys.contains(&e.from) && variant_keys.contains(&e.to) {
                return true;
            }
            if store.get(&e.from).is_none() || store.get(&e.to).is_none() {
                dangling += 1;
            } else {
                type_filtered += 1;
            }
            false
        })
        .collect();

    let (variant_graph, variant_index) = build_arena(&variant_nodes, &variant_edges);

    let anchors: Vec<NodeIndex> = variant_nodes
        .iter()
        .filter(|n| config.is_anchor(&n.node_type))
        .filter_map(|n| variant_index.get(&n.key()).copied())
        .collect();

    let anchored = !anchors.is_empty();
    let (connected_nodes, connected_edges, graph, index) = if anchored {
        let reached = flood_fill(&variant_graph, &anchors);
        let nodes: Vec<&Node> = variant_nodes
            .iter()
            .copied()
            .filter(|n| {
                variant_index
                    .get(&n.key())
                    .is_some_and(|idx| reached.contains(idx))
            })
            .collect();
        let keys: HashSet<NodeKey> = nodes.iter().map(|n| n.key()).collect();
        let edges: Vec<&Edge> = variant_edges
            .iter()
            .copied()
            .filter(|e| keys.contains(&e.from) && keys.contains(&e.to))
            .collect();
        let (graph, index) = build_arena(&nodes, &edges);
        (nodes, edges, graph, index)
    } else {
        (variant_nodes, variant_edges, variant_graph, variant_index)
    };

    let connected_node_keys: HashSet<NodeKey> = connected_nodes.iter().map(|n| n.key()).collect();

    let (mut visible_nodes, mut visible_edges) =
        apply_mask(&connected_nodes, &connected_edges, hidden);
    let mut mask_recovered = false;
    if visible_nodes.is_empty() && !connected_nodes.is_empty() && !hidden.is_empty() {
        info!(
            "Hide mask {:?} would blank the {} view; showing all types",
            hidden, kind
        );
        (visible_nodes, visible_edges) =
            apply_mask(&connected_nodes, &connected_edges, &BTreeSet::new());
        mask_recovered = true;
    }
    let visible_node_keys: HashSet<NodeKey> = visible_nodes.iter().map(|n| n.key()).collect();

    debug!(
        kind = %kind,
        generation,
        connected_nodes = connected_nodes.len(),
        connected_edges = connected_edges.len(),
        visible_nodes = visible_nodes.len(),
        visible_edges = visible_edges.len(),
        dangling,
        type_filtered,
        anchored,
        "resolved subgraph"
    );

    VisibleSubgraph {
        kind,
        generation,
        connected_nodes: connected_nodes.into_iter().cloned().collect(),
        connected_edges: connected_edges.into_iter().cloned().collect(),
        connected_node_keys,
        visible_nodes,
        visible_edges,
        visible_node_keys,
        anchored,
        mask_recovered,
        dangling_edges: dangling,
        graph,
        index,
    }
}

/// Intern nodes into an undirected graph. Edges must reference interned nodes.
fn build_arena(nodes: &[&Node], edges: &[&Edge]) -> (UnGraph<NodeKey, ()>, HashMap<NodeKey, NodeIndex>) {
    let mut graph = UnGraph::with_capacity(nodes.len(), edges.len());
    let mut index = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let key = node.key();
        let idx = graph.add_node(key.clone());
        index.insert(key, idx);
    }

    for edge in edges {
        if let (Some(&a), Some(&b)) = (index.get(&edge.from), index.get(&edge.to)) {
            graph.add_edge(a, b, ());
        }
    }

    (graph, index)
}

/// Breadth-first flood fill from every seed at once.
fn flood_fill(graph: &UnGraph<NodeKey, ()>, seeds: &[NodeIndex]) -> HashSet<NodeIndex> {
    let Some((&first, rest)) = seeds.split_first() else {
        return HashSet::new();
    };

    let mut bfs = Bfs::new(graph, first);
    for &seed in rest {
        if bfs.discovered.visit(seed) {
            bfs.stack.push_back(seed);
        }
    }

    let mut reached = HashSet::new();
    while let Some(idx) = bfs.next(graph) {
        reached.insert(idx);
    }
    reached
}

fn apply_mask(
    nodes: &[&Node],
    edges: &[&Edge],
    hidden: &BTreeSet<String>,
) -> (Vec<Node>, Vec<Edge>) {
    let visible: Vec<Node> = nodes
        .iter()
        .filter(|n| !hidden.contains(&n.node_type))
        .map(|n| (*n).clone())
        .collect();
    let keys: HashSet<NodeKey> = visible.iter().map(|n| n.key()).collect();
    let edges = edges
        .iter()
        .filter(|e| keys.contains(&e.from) && keys.contains(&e.to))
        .map(|e| (*e).clone())
        .collect();
    (visible, edges)
}
