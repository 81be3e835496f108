//! Deterministic seed positions derived from node keys.

use glam::{Vec2, Vec3};
use std::collections::hash_map::DefaultHasher;
use std::f32::consts::TAU;
use std::hash::{Hash, Hasher};

use crate::graph::NodeKey;

pub fn key_hash(key: &NodeKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

pub fn str_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Uniform value in [0, 1) from 21 bits of `hash` starting at `shift`.
fn unit(hash: u64, shift: u32) -> f32 {
    ((hash >> shift) & 0x1F_FFFF) as f32 / 0x20_0000 as f32
}

/// Point uniformly distributed in a disc of `radius`.
pub fn seed_2d(key: &NodeKey, radius: f32) -> Vec2 {
    let h = key_hash(key);
    let angle = unit(h, 0) * TAU;
    let r = radius * unit(h, 21).sqrt();
    Vec2::new(angle.cos(), angle.sin()) * r
}

/// Point uniformly distributed in a ball of `radius`.
pub fn seed_3d(key: &NodeKey, radius: f32) -> Vec3 {
    let h = key_hash(key);
    let z = unit(h, 0) * 2.0 - 1.0;
    let angle = unit(h, 21) * TAU;
    let r = radius * unit(h, 42).cbrt();
    let ring = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(ring * angle.cos(), ring * angle.sin(), z) * r
}

/// Seed radius that keeps density roughly constant as the graph grows.
pub fn seed_radius(node_count: usize, spacing: f32) -> f32 {
    spacing * (node_count.max(1) as f32).sqrt()
}
