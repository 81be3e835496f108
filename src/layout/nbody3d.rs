//! Custom 3D N-body layout projected to the screen through a view rotation.
//!
//! Each frame runs a fixed block of iterations:
//! - Repulsion `k / (d² + ε)` between all pairs (grid-approximated for big graphs)
//! - Springs `stiffness · (d − rest)` along edges
//! - Edge damping applied strictly along the edge direction
//! - Integration with velocity decay and a speed clamp
//! - Momentum cancellation so the system never drifts
//! - Alpha annealing: forces cool geometrically across iterations

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use super::projection::{Rotation, centroid_3d, project, unproject};
use super::seed::{seed_3d, seed_radius};
use super::{LayoutEngine, LayoutInput, Positions};
use crate::graph::NodeKey;

/// Repulsion constant at 0 % and 100 % of the slider.
const REPULSION_MIN: f32 = 150.0;
const REPULSION_MAX: f32 = 60_000.0;

/// Average speed under which the simulation counts as settled.
const SETTLED_SPEED: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NBodyParams {
    /// Iterations per frame
    pub iterations: usize,
    /// Repulsion slider, 0 - 100
    pub repulsion_pct: f32,
    pub rest_length: f32,
    pub stiffness: f32,
    /// Fraction of the relative edge-axis velocity removed per iteration (0.0 - 1.0)
    pub edge_damping: f32,
    /// Velocity retained per iteration (0.0 - 1.0)
    pub velocity_decay: f32,
    pub max_speed: f32,
    /// Alpha multiplier per iteration
    pub alpha_decay: f32,
    pub alpha_min: f32,
    /// Added to squared distances in the repulsion term
    pub epsilon: f32,
    /// Node count above which repulsion switches to the spatial grid
    pub approximate_above: usize,
}

impl Default for NBodyParams {
    fn default() -> Self {
        Self {
            iterations: 6,
            repulsion_pct: 50.0,
            rest_length: 60.0,
            stiffness: 0.04,
            edge_damping: 0.3,
            velocity_decay: 0.6,
            max_speed: 15.0,
            alpha_decay: 0.985,
            alpha_min: 0.05,
            epsilon: 1.0,
            approximate_above: 500,
        }
    }
}

impl NBodyParams {
    pub fn sanitized(&self) -> Self {
        Self {
            iterations: self.iterations.clamp(1, 64),
            repulsion_pct: clamp_finite(self.repulsion_pct, 0.0, 100.0, 50.0),
            rest_length: clamp_finite(self.rest_length, 1.0, 10_000.0, 60.0),
            stiffness: clamp_finite(self.stiffness, 0.0, 1.0, 0.04),
            edge_damping: clamp_finite(self.edge_damping, 0.0, 1.0, 0.3),
            velocity_decay: clamp_finite(self.velocity_decay, 0.0, 1.0, 0.6),
            max_speed: clamp_finite(self.max_speed, 0.01, 10_000.0, 15.0),
            alpha_decay: clamp_finite(self.alpha_decay, 0.0, 1.0, 0.985),
            alpha_min: clamp_finite(self.alpha_min, 0.0, 1.0, 0.05),
            epsilon: clamp_finite(self.epsilon, 1e-6, 1e6, 1.0),
            approximate_above: self.approximate_above.max(2),
        }
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Map the 0-100 % repulsion slider onto the physics constant.
///
/// Smoothstep in log space: monotonic, flat at both ends, and evenly
/// perceptible through the middle of the range.
pub fn repulsion_constant(pct: f32) -> f32 {
    let t = clamp_finite(pct, 0.0, 100.0, 50.0) / 100.0;
    let eased = t * t * (3.0 - 2.0 * t);
    REPULSION_MIN * (REPULSION_MAX / REPULSION_MIN).powf(eased)
}

/// Per-node position and velocity, stored as dense arrays keyed by node.
#[derive(Debug, Clone, Default)]
pub struct PhysicsState {
    keys: Vec<NodeKey>,
    index: HashMap<NodeKey, usize>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
}

impl PhysicsState {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[allow(dead_code)]
    pub fn keys(&self) -> &[NodeKey] {
        &self.keys
    }

    #[allow(dead_code)]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[allow(dead_code)]
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn get(&self, key: &NodeKey) -> Option<(Vec3, Vec3)> {
        self.index
            .get(key)
            .map(|&i| (self.positions[i], self.velocities[i]))
    }

    pub fn mean_velocity(&self) -> Vec3 {
        if self.velocities.is_empty() {
            return Vec3::ZERO;
        }
        self.velocities.iter().copied().sum::<Vec3>() / self.velocities.len() as f32
    }

    fn recenter(&mut self) {
        let center = centroid_3d(&self.positions);
        for p in &mut self.positions {
            *p -= center;
        }
    }
}

pub struct NBodyLayout {
    params: NBodyParams,
    state: PhysicsState,
    rotation: Rotation,
    alpha: f32,
    generation: Option<u64>,
    avg_speed: f32,
}

impl NBodyLayout {
    pub fn new(params: NBodyParams) -> Self {
        Self {
            params: params.sanitized(),
            state: PhysicsState::default(),
            rotation: Rotation::default(),
            alpha: 1.0,
            generation: None,
            avg_speed: f32::INFINITY,
        }
    }

    #[allow(dead_code)]
    pub fn params(&self) -> &NBodyParams {
        &self.params
    }

    pub fn set_params(&mut self, params: NBodyParams) {
        self.params = params.sanitized();
        self.reheat();
    }

    /// Move the repulsion slider.
    pub fn set_repulsion_pct(&mut self, pct: f32) {
        self.params.repulsion_pct = clamp_finite(pct, 0.0, 100.0, 50.0);
        self.reheat();
    }

    #[allow(dead_code)]
    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn rotation_mut(&mut self) -> &mut Rotation {
        &mut self.rotation
    }

    #[allow(dead_code)]
    pub fn state(&self) -> &PhysicsState {
        &self.state
    }

    #[allow(dead_code)]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn reheat(&mut self) {
        self.alpha = 1.0;
    }

    /// Rebuild the arena for a new input. Known nodes keep position and
    /// velocity; nodes with a cached screen position are lifted back into
    /// world space under the current rotation; the rest are hash-seeded.
    fn sync(&mut self, input: &LayoutInput, prior: &Positions) {
        let radius = seed_radius(input.len(), self.params.rest_length);
        let rotation = self.rotation.quat();

        let mut next = PhysicsState {
            keys: input.keys.clone(),
            index: HashMap::with_capacity(input.len()),
            positions: Vec::with_capacity(input.len()),
            velocities: Vec::with_capacity(input.len()),
        };
        let mut reused = 0usize;
        for (i, key) in input.keys.iter().enumerate() {
            next.index.insert(key.clone(), i);
            if let Some((p, v)) = self.state.get(key) {
                next.positions.push(p);
                next.velocities.push(v);
                reused += 1;
            } else if let Some(&screen) = prior.get(key) {
                let depth = seed_3d(key, radius).z;
                next.positions.push(unproject(screen, depth, rotation));
                next.velocities.push(Vec3::ZERO);
            } else {
                next.positions.push(seed_3d(key, radius));
                next.velocities.push(Vec3::ZERO);
            }
        }

        debug!(
            nodes = input.len(),
            reused,
            generation = input.generation,
            "nbody3d resync"
        );

        self.state = next;
        self.generation = Some(input.generation);
        self.reheat();
    }

    /// Run one block of iterations over `edges`.
    pub fn iterate(&mut self, edges: &[(usize, usize)]) {
        let n = self.state.len();
        if n == 0 {
            return;
        }
        let p = self.params.clone();
        let k = repulsion_constant(p.repulsion_pct);
        let radius = seed_radius(n, p.rest_length);

        self.state.recenter();

        let mut forces = vec![Vec3::ZERO; n];
        let mut speed_sum = 0.0;
        for _ in 0..p.iterations {
            forces.fill(Vec3::ZERO);

            if n > p.approximate_above {
                repel_grid(&self.state.positions, &mut forces, k, p.epsilon, p.rest_length * 3.0);
            } else {
                repel_all_pairs(&self.state.positions, &mut forces, k, p.epsilon);
            }

            let positions = &self.state.positions;
            let velocities = &mut self.state.velocities;
            for &(a, b) in edges {
                if a >= n || b >= n || a == b {
                    continue;
                }
                let delta = positions[b] - positions[a];
                let dist = delta.length();
                if dist < 1e-6 {
                    continue;
                }
                let dir = delta / dist;

                let f = dir * (p.stiffness * (dist - p.rest_length));
                forces[a] += f;
                forces[b] -= f;

                // Equal and opposite impulses on the edge axis only
                let closing = (velocities[b] - velocities[a]).dot(dir);
                let impulse = dir * (closing * p.edge_damping * 0.5);
                velocities[a] += impulse;
                velocities[b] -= impulse;
            }

            for (v, f) in velocities.iter_mut().zip(&forces) {
                let mut next = (*v + *f * self.alpha) * p.velocity_decay;
                if !next.is_finite() {
                    next = Vec3::ZERO;
                }
                let speed = next.length();
                if speed > p.max_speed {
                    next = next / speed * p.max_speed;
                }
                *v = next;
            }

            let mean = self.state.mean_velocity();
            speed_sum = 0.0;
            for (i, v) in self.state.velocities.iter_mut().enumerate() {
                *v -= mean;
                speed_sum += v.length();
                let moved = self.state.positions[i] + *v;
                self.state.positions[i] = if moved.is_finite() {
                    moved
                } else {
                    seed_3d(&self.state.keys[i], radius)
                };
            }

            self.alpha = (self.alpha * p.alpha_decay).max(p.alpha_min);
        }

        self.state.recenter();
        self.avg_speed = speed_sum / n as f32;
    }

    /// Current screen positions under the view rotation.
    pub fn projected(&self) -> Vec<Vec2> {
        project(&self.state.positions, self.rotation.quat())
    }
}

fn repel_pair(positions: &[Vec3], forces: &mut [Vec3], i: usize, j: usize, k: f32, epsilon: f32) {
    let delta = positions[i] - positions[j];
    let d2 = delta.length_squared() + epsilon;
    let f = delta * (k / (d2 * d2.sqrt()));
    forces[i] += f;
    forces[j] -= f;
}

fn repel_all_pairs(positions: &[Vec3], forces: &mut [Vec3], k: f32, epsilon: f32) {
    let n = positions.len();
    for i in 0..n {
        for j in (i + 1)..n {
            repel_pair(positions, forces, i, j, k, epsilon);
        }
    }
}

/// Repulsion restricted to nodes in the same or adjacent grid cells.
fn repel_grid(positions: &[Vec3], forces: &mut [Vec3], k: f32, epsilon: f32, cell: f32) {
    let cell_of = |p: Vec3| -> (i32, i32, i32) {
        let c = (p / cell).floor();
        (c.x as i32, c.y as i32, c.z as i32)
    };

    let mut grid: HashMap<(i32, i32, i32), Vec<usize>> = HashMap::new();
    for (i, p) in positions.iter().enumerate() {
        grid.entry(cell_of(*p)).or_default().push(i);
    }

    for (i, p) in positions.iter().enumerate() {
        let (cx, cy, cz) = cell_of(*p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(members) = grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &j in members {
                        if j > i {
                            repel_pair(positions, forces, i, j, k, epsilon);
                        }
                    }
                }
            }
        }
    }
}

impl LayoutEngine for NBodyLayout {
    fn name(&self) -> &'static str {
        "nbody3d"
    }

    fn step(&mut self, input: &LayoutInput, prior: &Positions) -> Positions {
        if self.generation != Some(input.generation) || self.state.len() != input.len() {
            self.sync(input, prior);
        }
        self.iterate(&input.edges);
        self.state
            .keys
            .iter()
            .cloned()
            .zip(self.projected())
            .collect()
    }

    fn is_settled(&self) -> bool {
        self.avg_speed < SETTLED_SPEED
    }

    fn reset(&mut self) {
        self.state = PhysicsState::default();
        self.generation = None;
        self.avg_speed = f32::INFINITY;
        self.reheat();
    }
}
