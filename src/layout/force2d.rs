//! Delegate 2D layout: a generic force simulation with tunable repulsion,
//! edge-length range, gravity and friction.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::seed::{seed_2d, seed_radius};
use super::{LayoutEngine, LayoutInput, Positions};
use crate::graph::NodeKey;

/// Average speed under which the simulation counts as settled.
const SETTLED_SPEED: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceParams {
    /// Repulsion strength between every pair of nodes
    pub repulsion: f32,
    /// Rest length of edges between leaf nodes
    pub min_edge_length: f32,
    /// Rest length of edges between the best-connected nodes
    pub max_edge_length: f32,
    /// Spring constant along edges
    pub spring: f32,
    /// Pull toward the origin, proportional to distance
    pub gravity: f32,
    /// Velocity retained per tick (0.0 - 1.0)
    pub friction: f32,
    /// Maximum velocity per tick
    pub max_speed: f32,
    /// Minimum distance used for repulsion
    pub min_distance: f32,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            repulsion: 2400.0,
            min_edge_length: 40.0,
            max_edge_length: 140.0,
            spring: 0.05,
            gravity: 0.01,
            friction: 0.85,
            max_speed: 25.0,
            min_distance: 4.0,
        }
    }
}

impl ForceParams {
    /// Copy with every field forced into a usable range.
    pub fn sanitized(&self) -> Self {
        let min_edge = self.min_edge_length.max(1.0);
        Self {
            repulsion: self.repulsion.max(0.0),
            min_edge_length: min_edge,
            max_edge_length: self.max_edge_length.max(min_edge),
            spring: self.spring.clamp(0.0, 1.0),
            gravity: self.gravity.clamp(0.0, 1.0),
            friction: self.friction.clamp(0.0, 1.0),
            max_speed: self.max_speed.max(0.1),
            min_distance: self.min_distance.max(0.01),
        }
    }
}

/// Index-addressed 2D force simulation.
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    params: ForceParams,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
}

impl ForceSimulation {
    pub fn new(params: ForceParams) -> Self {
        Self {
            params: params.sanitized(),
            positions: Vec::new(),
            velocities: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForceParams {
        &self.params
    }

    pub fn set_params(&mut self, params: ForceParams) {
        self.params = params.sanitized();
    }

    /// Replace the node set.
    pub fn load(&mut self, positions: Vec<Vec2>, velocities: Vec<Vec2>) {
        debug_assert_eq!(positions.len(), velocities.len());
        self.positions = positions;
        self.velocities = velocities;
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    /// Rest length for an edge, growing with the connectivity of its endpoints.
    pub fn rest_length(&self, degree_sum: usize, max_degree_sum: usize) -> f32 {
        let t = if max_degree_sum > 2 {
            (degree_sum.saturating_sub(2)) as f32 / (max_degree_sum - 2) as f32
        } else {
            0.0
        };
        let p = &self.params;
        p.min_edge_length + (p.max_edge_length - p.min_edge_length) * t.clamp(0.0, 1.0)
    }

    /// Advance one tick. Returns the average speed afterwards.
    pub fn tick(&mut self, edges: &[(usize, usize)], rest_lengths: &[f32]) -> f32 {
        let n = self.positions.len();
        if n == 0 {
            return 0.0;
        }
        let p = self.params.clone();
        let mut forces = vec![Vec2::ZERO; n];

        // Repulsion between all pairs
        for i in 0..n {
            for j in (i + 1)..n {
                let delta = self.positions[i] - self.positions[j];
                let dist = delta.length().max(p.min_distance);
                let dir = if delta.length_squared() > 0.0 {
                    delta / delta.length()
                } else {
                    // Coincident nodes: separate along a fixed axis
                    Vec2::X
                };
                let f = dir * (p.repulsion / (dist * dist));
                forces[i] += f;
                forces[j] -= f;
            }
        }

        // Springs toward each edge's rest length
        for (e, &(a, b)) in edges.iter().enumerate() {
            if a >= n || b >= n {
                continue;
            }
            let delta = self.positions[b] - self.positions[a];
            let dist = delta.length();
            if dist < 1e-6 {
                continue;
            }
            let rest = rest_lengths.get(e).copied().unwrap_or(p.min_edge_length);
            let f = (delta / dist) * (p.spring * (dist - rest));
            forces[a] += f;
            forces[b] -= f;
        }

        // Gravity toward the origin
        for (force, pos) in forces.iter_mut().zip(&self.positions) {
            *force -= *pos * p.gravity;
        }

        let mut total_speed = 0.0;
        for i in 0..n {
            let mut v = (self.velocities[i] + forces[i]) * p.friction;
            if !v.is_finite() {
                v = Vec2::ZERO;
            }
            let speed = v.length();
            if speed > p.max_speed {
                v = v / speed * p.max_speed;
            }
            self.velocities[i] = v;
            self.positions[i] += v;
            total_speed += v.length();
        }

        total_speed / n as f32
    }
}

/// `LayoutEngine` over `ForceSimulation`, keyed by node.
pub struct Force2dLayout {
    sim: ForceSimulation,
    keys: Vec<NodeKey>,
    rest_lengths: Vec<f32>,
    generation: Option<u64>,
    avg_speed: f32,
}

impl Force2dLayout {
    pub fn new(params: ForceParams) -> Self {
        Self {
            sim: ForceSimulation::new(params),
            keys: Vec::new(),
            rest_lengths: Vec::new(),
            generation: None,
            avg_speed: f32::INFINITY,
        }
    }

    #[allow(dead_code)]
    pub fn simulation(&self) -> &ForceSimulation {
        &self.sim
    }

    pub fn set_params(&mut self, params: ForceParams) {
        self.sim.set_params(params);
        self.generation = None;
    }

    /// Rebuild simulation arrays for a new input, keeping known nodes' state.
    fn sync(&mut self, input: &LayoutInput, prior: &Positions) {
        let previous: HashMap<&NodeKey, usize> =
            self.keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let radius = seed_radius(input.len(), self.sim.params().min_edge_length);

        let mut positions = Vec::with_capacity(input.len());
        let mut velocities = Vec::with_capacity(input.len());
        let mut reused = 0usize;
        for key in &input.keys {
            if let Some(&i) = previous.get(key) {
                positions.push(self.sim.positions()[i]);
                velocities.push(self.sim.velocities()[i]);
                reused += 1;
            } else if let Some(&cached) = prior.get(key) {
                positions.push(cached);
                velocities.push(Vec2::ZERO);
            } else {
                positions.push(seed_2d(key, radius));
                velocities.push(Vec2::ZERO);
            }
        }

        let max_degree_sum = input
            .edges
            .iter()
            .map(|&(a, b)| input.degrees[a] + input.degrees[b])
            .max()
            .unwrap_or(0);
        self.rest_lengths = input
            .edges
            .iter()
            .map(|&(a, b)| {
                self.sim
                    .rest_length(input.degrees[a] + input.degrees[b], max_degree_sum)
            })
            .collect();

        debug!(
            nodes = input.len(),
            reused,
            generation = input.generation,
            "force2d resync"
        );

        self.sim.load(positions, velocities);
        self.keys = input.keys.clone();
        self.generation = Some(input.generation);
        self.avg_speed = f32::INFINITY;
    }
}

impl LayoutEngine for Force2dLayout {
    fn name(&self) -> &'static str {
        "force2d"
    }

    fn step(&mut self, input: &LayoutInput, prior: &Positions) -> Positions {
        if self.generation != Some(input.generation) || self.keys.len() != input.len() {
            self.sync(input, prior);
        }
        self.avg_speed = self.sim.tick(&input.edges, &self.rest_lengths);
        self.keys
            .iter()
            .cloned()
            .zip(self.sim.positions().iter().copied())
            .collect()
    }

    fn is_settled(&self) -> bool {
        self.avg_speed < SETTLED_SPEED
    }

    fn reset(&mut self) {
        self.keys.clear();
        self.rest_lengths.clear();
        self.sim.load(Vec::new(), Vec::new());
        self.generation = None;
        self.avg_speed = f32::INFINITY;
    }
}
