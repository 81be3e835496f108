//! Visual encoding of a resolved, laid-out view.

use clap::ValueEnum;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::selection::SelectionController;
use crate::graph::{NodeKey, VisibleSubgraph};
use crate::layout::{LayoutMode, Positions, seed::seed_2d, seed::str_hash};

/// Maximum lightness shift applied per node type, as a fraction.
const COLOR_JITTER: f32 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Palette {
    #[default]
    Vivid,
    OkabeIto,
    Tableau,
    Pastel,
}

impl Palette {
    pub fn colors(&self) -> &'static [[u8; 3]] {
        match self {
            Palette::Vivid => &[
                [0xe6, 0x19, 0x4b],
                [0x3c, 0xb4, 0x4b],
                [0x43, 0x63, 0xd8],
                [0xf5, 0x82, 0x31],
                [0x91, 0x1e, 0xb4],
                [0x42, 0xd4, 0xf4],
                [0xf0, 0x32, 0xe6],
                [0xbf, 0xef, 0x45],
                [0xff, 0xe1, 0x19],
                [0x46, 0x99, 0x90],
            ],
            Palette::OkabeIto => &[
                [0xe6, 0x9f, 0x00],
                [0x56, 0xb4, 0xe9],
                [0x00, 0x9e, 0x73],
                [0xf0, 0xe4, 0x42],
                [0x00, 0x72, 0xb2],
                [0xd5, 0x5e, 0x00],
                [0xcc, 0x79, 0xa7],
                [0x99, 0x99, 0x99],
            ],
            Palette::Tableau => &[
                [0x4e, 0x79, 0xa7],
                [0xf2, 0x8e, 0x2b],
                [0xe1, 0x57, 0x59],
                [0x76, 0xb7, 0xb2],
                [0x59, 0xa1, 0x4f],
                [0xed, 0xc9, 0x48],
                [0xb0, 0x7a, 0xa1],
                [0xff, 0x9d, 0xa7],
                [0x9c, 0x75, 0x5f],
                [0xba, 0xb0, 0xac],
            ],
            Palette::Pastel => &[
                [0xfb, 0xb4, 0xae],
                [0xb3, 0xcd, 0xe3],
                [0xcc, 0xeb, 0xc5],
                [0xde, 0xcb, 0xe4],
                [0xfe, 0xd9, 0xa6],
                [0xff, 0xff, 0xcc],
                [0xe5, 0xd8, 0xbd],
                [0xfd, 0xda, 0xec],
            ],
        }
    }

    /// Hex color for a node type: hashed palette slot plus a small lightness jitter.
    pub fn color_for(&self, node_type: &str) -> String {
        let colors = self.colors();
        let hash = str_hash(node_type);
        let [r, g, b] = colors[(hash % colors.len() as u64) as usize];

        let jitter = (((hash >> 32) & 0xFFFF) as f32 / 0xFFFF as f32 * 2.0 - 1.0) * COLOR_JITTER;
        let shift = |c: u8| -> u8 {
            let c = c as f32;
            let out = if jitter >= 0.0 {
                c + (255.0 - c) * jitter
            } else {
                c * (1.0 + jitter)
            };
            out.round().clamp(0.0, 255.0) as u8
        };
        format!("#{:02x}{:02x}{:02x}", shift(r), shift(g), shift(b))
    }
}

impl std::fmt::Display for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Palette::Vivid => "vivid",
            Palette::OkabeIto => "okabe-ito",
            Palette::Tableau => "tableau",
            Palette::Pastel => "pastel",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub palette: Palette,
    /// Node size control, percent
    pub size_pct: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Base opacity (0.0 - 1.0)
    pub opacity: f32,
    pub labels: bool,
    /// Minimum radius for a label to be drawn
    pub label_threshold: f32,
    /// Labels are hidden once this many nodes are visible
    pub density_ceiling: usize,
    /// Opacity multiplier for nodes outside the pinned focus
    pub dim_factor: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            palette: Palette::Vivid,
            size_pct: 100.0,
            min_radius: 4.0,
            max_radius: 16.0,
            opacity: 0.9,
            labels: true,
            label_threshold: 8.0,
            density_ceiling: 200,
            dim_factor: 0.15,
        }
    }
}

impl RenderSettings {
    pub fn sanitized(&self) -> Self {
        let fin = |v: f32, lo: f32, hi: f32, d: f32| if v.is_finite() { v.clamp(lo, hi) } else { d };
        let min_radius = fin(self.min_radius, 0.5, 200.0, 4.0);
        Self {
            palette: self.palette,
            size_pct: fin(self.size_pct, 10.0, 400.0, 100.0),
            min_radius,
            max_radius: fin(self.max_radius, min_radius, 400.0, 16.0).max(min_radius),
            opacity: fin(self.opacity, 0.05, 1.0, 0.9),
            labels: self.labels,
            label_threshold: fin(self.label_threshold, 0.0, 400.0, 8.0),
            density_ceiling: self.density_ceiling,
            dim_factor: fin(self.dim_factor, 0.0, 1.0, 0.15),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeVisual {
    #[serde(flatten)]
    pub key: NodeKey,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
    pub opacity: f32,
    pub show_label: bool,
    pub selected: bool,
    pub hovered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeVisual {
    pub from: NodeKey,
    pub to: NodeKey,
    pub relation: String,
    pub label: String,
    pub opacity: f32,
}

/// One rendered frame of a view session.
#[derive(Debug, Clone, Serialize)]
pub struct RenderFrame {
    pub session: String,
    pub mode: LayoutMode,
    pub generation: u64,
    pub pinned: bool,
    pub settled: bool,
    pub nodes: Vec<NodeVisual>,
    pub edges: Vec<EdgeVisual>,
}

impl RenderFrame {
    /// Bounding box of node circles as `(min, max)`.
    pub fn bounds(&self) -> Option<(Vec2, Vec2)> {
        let mut nodes = self.nodes.iter();
        let first = nodes.next()?;
        let r = Vec2::splat(first.radius);
        let p = Vec2::new(first.x, first.y);
        let (mut min, mut max) = (p - r, p + r);
        for n in nodes {
            let r = Vec2::splat(n.radius);
            let p = Vec2::new(n.x, n.y);
            min = min.min(p - r);
            max = max.max(p + r);
        }
        Some((min, max))
    }
}

/// Maps resolver, layout and selection state to visuals, and remembers
/// screen positions so the next layout pass can seed from them.
#[derive(Debug, Default)]
pub struct RenderAdapter {
    settings: RenderSettings,
    cache: Positions,
}

impl RenderAdapter {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings: settings.sanitized(),
            cache: Positions::new(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = settings.sanitized();
    }

    pub fn cache(&self) -> &Positions {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Radius for `degree` given the visible degree range.
    pub fn radius(&self, degree: usize, min_degree: usize, max_degree: usize) -> f32 {
        let t = if max_degree > min_degree {
            (degree.saturating_sub(min_degree)) as f32 / (max_degree - min_degree) as f32
        } else {
            0.5
        };
        let s = &self.settings;
        (s.min_radius + (s.max_radius - s.min_radius) * t.clamp(0.0, 1.0)) * s.size_pct / 100.0
    }

    pub fn show_label(&self, radius: f32, visible_count: usize) -> bool {
        self.settings.labels
            && radius >= self.settings.label_threshold
            && visible_count < self.settings.density_ceiling
    }

    pub fn build_frame(
        &mut self,
        session: &str,
        mode: LayoutMode,
        subgraph: &VisibleSubgraph,
        positions: &Positions,
        selection: &SelectionController,
        settled: bool,
    ) -> RenderFrame {
        let degrees = subgraph.visible_degrees();
        let min_degree = degrees.values().copied().min().unwrap_or(0);
        let max_degree = degrees.values().copied().max().unwrap_or(0);
        let visible_count = subgraph.visible_nodes.len();
        let base = self.settings.opacity;

        let pinned = selection.is_pinned();
        let dimmed = |key: &NodeKey| pinned && !selection.in_focus(key, subgraph);

        let spread = (visible_count.max(1) as f32).sqrt() * self.settings.max_radius * 4.0;
        let nodes: Vec<NodeVisual> = subgraph
            .visible_nodes
            .iter()
            .map(|node| {
                let key = node.key();
                let degree = degrees.get(&key).copied().unwrap_or(0);
                let radius = self.radius(degree, min_degree, max_degree);
                let pos = positions
                    .get(&key)
                    .or_else(|| self.cache.get(&key))
                    .copied()
                    .unwrap_or_else(|| seed_2d(&key, spread));
                let opacity = if dimmed(&key) {
                    base * self.settings.dim_factor
                } else {
                    base
                };
                NodeVisual {
                    label: node.label(),
                    x: pos.x,
                    y: pos.y,
                    radius,
                    color: self.settings.palette.color_for(&node.node_type),
                    opacity,
                    show_label: self.show_label(radius, visible_count),
                    selected: selection.is_selected(&key),
                    hovered: selection.hover() == Some(&key),
                    key,
                }
            })
            .collect();

        let edges: Vec<EdgeVisual> = subgraph
            .visible_edges
            .iter()
            .map(|edge| {
                let opacity = if pinned && !selection.edge_in_focus(&edge.from, &edge.to) {
                    base * self.settings.dim_factor
                } else {
                    base
                };
                EdgeVisual {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    relation: edge.relation().to_string(),
                    label: edge.label().to_string(),
                    opacity,
                }
            })
            .collect();

        for n in &nodes {
            self.cache.insert(n.key.clone(), Vec2::new(n.x, n.y));
        }

        RenderFrame {
            session: session.to_string(),
            mode,
            generation: subgraph.generation,
            pinned,
            settled,
            nodes,
            edges,
        }
    }
}
