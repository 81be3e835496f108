//! Rotation of the 3D layout and projection to screen space.

use glam::{EulerRot, Quat, Vec2, Vec3};

/// Radians of drag rotation per screen pixel.
const DRAG_SENSITIVITY: f32 = 0.01;

/// View rotation: slider-driven Euler angles (degrees) composed with an
/// optional interactive drag quaternion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub drag: Option<Quat>,
}

impl Rotation {
    pub fn from_degrees(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self {
            pitch,
            yaw,
            roll,
            drag: None,
        }
    }

    pub fn euler(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            sanitize_degrees(self.yaw).to_radians(),
            sanitize_degrees(self.pitch).to_radians(),
            sanitize_degrees(self.roll).to_radians(),
        )
    }

    /// Combined rotation; the drag quaternion is applied after the sliders.
    pub fn quat(&self) -> Quat {
        match self.drag {
            Some(drag) => normalize_quat(normalize_quat(drag) * self.euler()),
            None => self.euler(),
        }
    }

    /// Compose a drag gesture of `(dx, dy)` pixels into the drag quaternion.
    pub fn apply_drag(&mut self, dx: f32, dy: f32) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let delta = Quat::from_rotation_y(dx * DRAG_SENSITIVITY)
            * Quat::from_rotation_x(dy * DRAG_SENSITIVITY);
        let current = self.drag.map(normalize_quat).unwrap_or(Quat::IDENTITY);
        self.drag = Some(normalize_quat(delta * current));
    }

    /// Set the drag quaternion from raw `[x, y, z, w]` components.
    pub fn set_drag(&mut self, xyzw: [f32; 4]) {
        self.drag = Some(normalize_quat(Quat::from_array(xyzw)));
    }
}

fn sanitize_degrees(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Unit-length copy of `q`; degenerate or non-finite input becomes identity.
pub fn normalize_quat(q: Quat) -> Quat {
    let len = q.length();
    if !len.is_finite() || len < 1e-6 {
        Quat::IDENTITY
    } else {
        q / len
    }
}

pub fn centroid_2d(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    points.iter().copied().sum::<Vec2>() / points.len() as f32
}

pub fn centroid_3d(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    points.iter().copied().sum::<Vec3>() / points.len() as f32
}

/// Rotate every point, drop depth, and recenter the result on the origin.
pub fn project(points: &[Vec3], rotation: Quat) -> Vec<Vec2> {
    let mut projected: Vec<Vec2> = points
        .iter()
        .map(|p| {
            let r = rotation * *p;
            Vec2::new(r.x, r.y)
        })
        .collect();

    let center = centroid_2d(&projected);
    for p in &mut projected {
        *p -= center;
    }
    projected
}

/// Lift a screen position back into world space at the given depth.
pub fn unproject(screen: Vec2, depth: f32, rotation: Quat) -> Vec3 {
    rotation.inverse() * Vec3::new(screen.x, screen.y, depth)
}
